//! REST client configuration

use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the REST keyword client.
///
/// `base_url` and `default_headers` are the per-suite session settings; the
/// remaining fields configure the underlying transport once at construction.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URL joined with every relative endpoint (e.g., "https://api.example.com")
    pub base_url: Option<String>,

    /// Headers sent with every request unless overridden per call
    pub default_headers: HashMap<String, String>,

    /// Total request timeout
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// Maximum number of redirects to follow
    pub max_redirects: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Whether to accept invalid certificates (for testing only)
    pub danger_accept_invalid_certs: bool,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            max_redirects: 10,
            user_agent: format!("keystone-http/{}", env!("CARGO_PKG_VERSION")),
            danger_accept_invalid_certs: false,
        }
    }
}

impl RestClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `KEYSTONE_BASE_URL` and `KEYSTONE_HTTP_TIMEOUT_SECS`.
    ///
    /// Unset or unparsable variables leave the defaults in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("KEYSTONE_BASE_URL") {
            if !url.is_empty() {
                config.base_url = Some(url);
            }
        }
        if let Some(timeout) = std::env::var("KEYSTONE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| parse_timeout_secs(&v))
        {
            config.timeout = timeout;
        }
        config
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a default header
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Set the total timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set timeout from seconds (convenience method for the runner).
    ///
    /// Zero, negative, NaN and out-of-range values leave the timeout unchanged.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        if let Some(timeout) = secs_to_timeout(secs) {
            self.timeout = timeout;
        }
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Accept invalid certificates (DANGER - testing only)
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }
}

fn secs_to_timeout(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|timeout| !timeout.is_zero())
}

fn parse_timeout_secs(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(secs_to_timeout)
}
