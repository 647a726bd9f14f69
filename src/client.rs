use super::form::FileUpload;
use super::*;

/// Out-of-band CGI-style parameters (`HTTP_*` headers, `PHP_AUTH_*`)
/// attached to an outgoing request.
pub type ServerParameters = BTreeMap<String, String>;

/// A request as dispatched to a [`Handler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub uri: String,
    pub parameters: Vec<(String, String)>,
    pub files: Vec<(String, FileUpload)>,
    pub server: ServerParameters,
    pub cookies: BTreeMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            parameters: Vec::new(),
            files: Vec::new(),
            server: ServerParameters::new(),
            cookies: BTreeMap::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Last body parameter named `name`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn parameter_values(&self, name: &str) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Last query-string parameter named `name`, decoded.
    pub fn query_parameter(&self, name: &str) -> Option<String> {
        let uri = url::Url::parse(&self.uri).ok()?;
        uri.query_pairs()
            .filter(|(key, _)| key == name)
            .last()
            .map(|(_, value)| value.into_owned())
    }

    pub fn file(&self, name: &str) -> Option<&FileUpload> {
        self.files
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, upload)| upload)
    }

    pub fn server_parameter(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// A canned or recorded HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    content: String,
}

impl Response {
    /// A `200` HTML response.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            content: content.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: Vec::new(),
            content: "Not Found".to_string(),
        }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Location".to_string(), location.into())],
            content: String::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// First value of header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// All headers keyed by lower-cased name.
    pub fn headers(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in &self.headers {
            out.entry(key.to_ascii_lowercase())
                .or_default()
                .push(value.clone());
        }
        out
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308) && self.header("location").is_some()
    }
}

/// The simulated browser the driver delegates to.
pub trait BrowserClient {
    /// Issues a request and makes its response the current page.
    fn request(
        &mut self,
        method: &str,
        uri: &str,
        parameters: &[(String, String)],
        files: &[(String, FileUpload)],
        server: &ServerParameters,
    ) -> Result<()>;

    /// Submits `form`, with `extra` values applied on a copy of it.
    fn submit(
        &mut self,
        form: &FormModel,
        extra: &[(String, FieldValue)],
        server: &ServerParameters,
    ) -> Result<()> {
        let mut form = form.clone();
        form.set_values(extra.iter().cloned())?;
        let uri = form.uri()?;
        let method = form.method().to_string();
        self.request(
            &method,
            &uri,
            &form.parameters(),
            &form.request_files(),
            server,
        )
    }

    fn cookie_jar(&self) -> &CookieJar;

    fn cookie_jar_mut(&mut self) -> &mut CookieJar;

    fn internal_request(&self) -> Option<&Request>;

    fn internal_response(&self) -> Option<&Response>;

    /// The parsed current page, when it is HTML.
    fn crawler(&self) -> Option<&Document>;

    /// Forgets cookies and history.
    fn restart(&mut self);

    fn reload(&mut self) -> Result<()>;

    fn back(&mut self) -> Result<()>;

    fn forward(&mut self) -> Result<()>;
}
