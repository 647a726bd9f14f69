use super::*;
use std::collections::VecDeque;

/// The application under test, as seen by [`Browser`].
pub trait Handler {
    fn handle(&mut self, request: &Request) -> Result<Response>;
}

impl<F> Handler for F
where
    F: FnMut(&Request) -> Result<Response>,
{
    fn handle(&mut self, request: &Request) -> Result<Response> {
        self(request)
    }
}

/// Routes requests to registered pages and records every request it sees.
///
/// Lookup order: a queued one-shot response, the full URI, the URI without
/// its query string, then the bare path. Anything else is a `404`.
#[derive(Debug, Clone, Default)]
pub struct MockHandler {
    pages: HashMap<String, Response>,
    next: VecDeque<Response>,
    requests: Vec<Request>,
}

impl MockHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_page(&mut self, uri: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(uri.into(), Response::new(html));
    }

    pub fn set_response(&mut self, uri: impl Into<String>, response: Response) {
        self.pages.insert(uri.into(), response);
    }

    #[must_use]
    pub fn with_page(mut self, uri: impl Into<String>, html: impl Into<String>) -> Self {
        self.set_page(uri, html);
        self
    }

    /// Queues a response served to the next request whatever its URI.
    pub fn set_next_response(&mut self, response: Response) {
        self.next.push_back(response);
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn last_request(&self) -> Option<&Request> {
        self.requests.last()
    }

    fn route(&self, request: &Request) -> Option<Response> {
        if let Some(page) = self.pages.get(request.uri()) {
            return Some(page.clone());
        }
        let parsed = url::Url::parse(request.uri()).ok()?;
        let mut without_query = parsed.clone();
        without_query.set_query(None);
        without_query.set_fragment(None);
        self.pages
            .get(without_query.as_str())
            .or_else(|| self.pages.get(parsed.path()))
            .cloned()
    }
}

impl Handler for MockHandler {
    fn handle(&mut self, request: &Request) -> Result<Response> {
        self.requests.push(request.clone());
        let response = self
            .next
            .pop_front()
            .or_else(|| self.route(request))
            .unwrap_or_else(Response::not_found);
        tracing::trace!(uri = %request.uri(), status = response.status(), "mock response");
        Ok(response)
    }
}
