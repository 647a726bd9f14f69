use super::client::BrowserClient;
use super::form::FileUpload;
use super::*;

/// In-process browser: keeps history and cookies, follows redirects and
/// parses every response into a [`Document`].
///
/// Cloning deep-copies the jar and history, so clones never observe each
/// other's navigation.
#[derive(Debug, Clone)]
pub struct Browser<H> {
    handler: H,
    config: DriverConfig,
    cookie_jar: CookieJar,
    history: Vec<Request>,
    position: usize,
    request: Option<Request>,
    response: Option<Response>,
    document: Option<Document>,
}

impl<H: Handler> Browser<H> {
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, DriverConfig::default())
    }

    pub fn with_config(handler: H, config: DriverConfig) -> Self {
        Self {
            handler,
            config,
            cookie_jar: CookieJar::new(),
            history: Vec::new(),
            position: 0,
            request: None,
            response: None,
            document: None,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Resolves `uri` against the current page, or the configured base URL
    /// before the first request.
    pub fn absolute_uri(&self, uri: &str) -> Result<String> {
        let base = self
            .request
            .as_ref()
            .map_or(self.config.base_url.as_str(), |request| request.uri.as_str());
        Ok(url::Url::parse(base)?.join(uri)?.to_string())
    }

    fn dispatch(&mut self, mut request: Request, change_history: bool) -> Result<()> {
        let mut redirects = 0usize;
        loop {
            request.cookies = self.cookie_jar.all_values(&request.uri);
            tracing::debug!(method = %request.method, uri = %request.uri, "dispatching request");

            let response = self.handler.handle(&request)?;
            self.cookie_jar
                .update_from_set_cookies(response.header_values("set-cookie"), &request.uri);

            if !(self.config.follow_redirects && response.is_redirect()) {
                self.commit(request, response, change_history);
                return Ok(());
            }

            if redirects >= self.config.max_redirects {
                return Err(Error::driver(format!(
                    "The maximum number ({}) of redirections was reached.",
                    self.config.max_redirects
                )));
            }
            redirects += 1;

            let location = response.header("location").unwrap_or_default();
            let target = url::Url::parse(&request.uri)?.join(location)?.to_string();
            tracing::debug!(status = response.status(), %target, "following redirect");
            request = match response.status() {
                307 | 308 => Request {
                    uri: target,
                    ..request
                },
                _ => Request {
                    server: request.server,
                    ..Request::new("GET", target)
                },
            };
        }
    }

    fn commit(&mut self, request: Request, response: Response, change_history: bool) {
        if change_history {
            if !self.history.is_empty() {
                self.history.truncate(self.position + 1);
            }
            self.history.push(request.clone());
            self.position = self.history.len() - 1;
        }

        self.document = match Document::parse(request.uri.clone(), response.content()) {
            Ok(document) => Some(document),
            Err(err) => {
                tracing::debug!(%err, uri = %request.uri, "response is not parseable html");
                None
            }
        };
        self.request = Some(request);
        self.response = Some(response);
    }

    fn replay(&mut self, position: usize) -> Result<()> {
        let request = self
            .history
            .get(position)
            .cloned()
            .ok_or_else(|| Error::driver("The page history is empty."))?;
        self.position = position;
        self.dispatch(request, false)
    }
}

impl<H: Handler> BrowserClient for Browser<H> {
    fn request(
        &mut self,
        method: &str,
        uri: &str,
        parameters: &[(String, String)],
        files: &[(String, FileUpload)],
        server: &ServerParameters,
    ) -> Result<()> {
        let mut request = Request::new(method.to_ascii_uppercase(), self.absolute_uri(uri)?);
        request.parameters = parameters.to_vec();
        request.files = files.to_vec();
        request.server = server.clone();
        self.dispatch(request, true)
    }

    fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    fn cookie_jar_mut(&mut self) -> &mut CookieJar {
        &mut self.cookie_jar
    }

    fn internal_request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    fn internal_response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    fn crawler(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    fn restart(&mut self) {
        self.cookie_jar.clear();
        self.history.clear();
        self.position = 0;
    }

    fn reload(&mut self) -> Result<()> {
        self.replay(self.position)
    }

    fn back(&mut self) -> Result<()> {
        if self.history.is_empty() || self.position == 0 {
            return Err(Error::driver("You are already on the first page."));
        }
        self.replay(self.position - 1)
    }

    fn forward(&mut self) -> Result<()> {
        if self.position + 1 >= self.history.len() {
            return Err(Error::driver("You are already on the last page."));
        }
        self.replay(self.position + 1)
    }
}
