use super::*;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    /// Empty matches every host.
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
    pub expires: Option<SystemTime>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            domain: String::new(),
            secure: false,
            http_only: false,
            expires: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|expires| expires <= SystemTime::now())
    }

    fn matches_host(&self, host: &str) -> bool {
        if self.domain.is_empty() {
            return true;
        }
        let domain = self.domain.trim_start_matches('.');
        host == domain || host.ends_with(&format!(".{domain}"))
    }
}

type CookieKey = (String, String, String);

/// Cookies indexed by domain, path and name.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: BTreeMap<CookieKey, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, cookie: Cookie) {
        let key = (
            cookie.domain.clone(),
            cookie.path.clone(),
            cookie.name.clone(),
        );
        self.cookies.insert(key, cookie);
    }

    /// First live cookie named `name` whose path is a prefix of `path`,
    /// restricted to `domain` when given.
    pub fn get(&self, name: &str, path: &str, domain: Option<&str>) -> Option<&Cookie> {
        self.cookies.values().find(|cookie| {
            cookie.name == name
                && !cookie.is_expired()
                && path.starts_with(cookie.path.as_str())
                && domain.is_none_or(|domain| cookie.matches_host(domain))
        })
    }

    /// Removes `name` stored under exactly `path`, for `domain` or for every
    /// domain when `None`.
    pub fn expire(&mut self, name: &str, path: &str, domain: Option<&str>) {
        let path = if path.is_empty() { "/" } else { path };
        self.cookies.retain(|(cookie_domain, cookie_path, cookie_name), _| {
            let targeted = cookie_name == name
                && cookie_path == path
                && domain.is_none_or(|domain| cookie_domain == domain);
            !targeted
        });
    }

    /// Name/value pairs the jar would send to `uri`.
    pub fn all_values(&self, uri: &str) -> BTreeMap<String, String> {
        let Ok(uri) = url::Url::parse(uri) else {
            return BTreeMap::new();
        };
        let host = uri.host_str().unwrap_or_default();
        let path = uri.path();
        let secure = uri.scheme() == "https";

        self.cookies
            .values()
            .filter(|cookie| {
                !cookie.is_expired()
                    && cookie.matches_host(host)
                    && path.starts_with(cookie.path.as_str())
                    && (secure || !cookie.secure)
            })
            .map(|cookie| (cookie.name.clone(), cookie.value.clone()))
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn flush_expired(&mut self) {
        self.cookies.retain(|_, cookie| !cookie.is_expired());
    }

    /// Stores every parseable `Set-Cookie` value received from `uri`.
    /// Missing domains default to the request host and missing paths to the
    /// request directory.
    pub fn update_from_set_cookies<'a>(
        &mut self,
        set_cookies: impl IntoIterator<Item = &'a str>,
        uri: &str,
    ) {
        let parsed_uri = url::Url::parse(uri).ok();
        let default_domain = parsed_uri
            .as_ref()
            .and_then(|uri| uri.host_str())
            .unwrap_or_default()
            .to_string();
        let default_path = parsed_uri
            .as_ref()
            .map(|uri| default_cookie_path(uri.path()))
            .unwrap_or_else(|| "/".to_string());

        for header in set_cookies {
            let parsed = match cookie::Cookie::parse(header) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::debug!(%err, header, "ignoring malformed Set-Cookie");
                    continue;
                }
            };

            let mut stored = Cookie::new(parsed.name(), parsed.value())
                .with_path(parsed.path().unwrap_or(&default_path))
                .with_domain(parsed.domain().unwrap_or(&default_domain));
            stored.secure = parsed.secure().unwrap_or(false);
            stored.http_only = parsed.http_only().unwrap_or(false);

            if let Some(max_age) = parsed.max_age() {
                let seconds = max_age.whole_seconds();
                if seconds <= 0 {
                    self.expire(&stored.name, &stored.path, Some(&stored.domain));
                    continue;
                }
                stored.expires =
                    Some(SystemTime::now() + Duration::from_secs(seconds.unsigned_abs()));
            } else if let Some(expires) = parsed.expires_datetime() {
                stored.expires = Some(SystemTime::from(expires));
            }

            if stored.is_expired() {
                self.expire(&stored.name, &stored.path, Some(&stored.domain));
            } else {
                self.set(stored);
            }
        }
    }
}

fn default_cookie_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}
