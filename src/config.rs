use serde::Deserialize;

/// Browser and driver settings.
///
/// Every field has a default, so a partial document deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Resolves relative URLs before the first request.
    pub base_url: String,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Strip a leading `/name.php` front-controller segment from visited URLs.
    pub remove_script_from_url: bool,
    /// Reduce visited URLs to their path and query.
    pub remove_host_from_url: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/".to_string(),
            follow_redirects: true,
            max_redirects: 20,
            remove_script_from_url: false,
            remove_host_from_url: false,
        }
    }
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    #[must_use]
    pub const fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    #[must_use]
    pub const fn remove_script_from_url(mut self, remove: bool) -> Self {
        self.remove_script_from_url = remove;
        self
    }

    #[must_use]
    pub const fn remove_host_from_url(mut self, remove: bool) -> Self {
        self.remove_host_from_url = remove;
        self
    }
}
