//! Configuration for the downloader.

use std::time::Duration;

/// Construction-time settings for the downloader. Supplied by the embedding
/// crawler; the core performs no file or environment access itself.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Whether requests are routed through the proxy pool.
    pub proxy_enabled: bool,
    /// Reuse cap applied to each proxy record.
    pub max_reuse: u32,
    /// Bounded capacity of the proxy pool.
    pub pool_capacity: usize,
    /// URL of the external proxy-provisioning service.
    pub proxy_source_url: String,
    /// Whether the transport keeps a cookie store.
    pub cookie_enabled: bool,
    /// Per-request timeout. Values outside (0, 120] seconds reset to 30s.
    pub timeout: Duration,
    /// Default User-Agent header.
    pub user_agent: String,
    /// Whether the transport follows redirects.
    pub allow_redirects: bool,
    /// Maximum attempts per logical download.
    pub retry_tries: u32,
    /// Initial delay before the first retry.
    pub retry_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub retry_backoff: f64,
}

impl DownloaderConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DownloaderConfigBuilder {
        DownloaderConfigBuilder::new()
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        DownloaderConfigBuilder::new().build()
    }
}

/// Builder for `DownloaderConfig`.
pub struct DownloaderConfigBuilder {
    proxy_enabled: Option<bool>,
    max_reuse: Option<u32>,
    pool_capacity: Option<usize>,
    proxy_source_url: Option<String>,
    cookie_enabled: Option<bool>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    allow_redirects: Option<bool>,
    retry_tries: Option<u32>,
    retry_delay: Option<Duration>,
    retry_backoff: Option<f64>,
}

impl DownloaderConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            proxy_enabled: None,
            max_reuse: None,
            pool_capacity: None,
            proxy_source_url: None,
            cookie_enabled: None,
            timeout: None,
            user_agent: None,
            allow_redirects: None,
            retry_tries: None,
            retry_delay: None,
            retry_backoff: None,
        }
    }

    /// Route requests through the proxy pool.
    pub fn proxy_enabled(mut self, enabled: bool) -> Self {
        self.proxy_enabled = Some(enabled);
        self
    }

    /// Set the reuse cap applied to each proxy record.
    pub fn max_reuse(mut self, count: u32) -> Self {
        self.max_reuse = Some(count);
        self
    }

    /// Set the bounded capacity of the proxy pool.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = Some(capacity);
        self
    }

    /// Set the URL of the external proxy-provisioning service.
    pub fn proxy_source_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_source_url = Some(url.into());
        self
    }

    /// Keep a cookie store on the transport.
    pub fn cookie_enabled(mut self, enabled: bool) -> Self {
        self.cookie_enabled = Some(enabled);
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default User-Agent header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Follow redirects on the transport.
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = Some(allow);
        self
    }

    /// Set the maximum attempts per logical download.
    pub fn retry_tries(mut self, tries: u32) -> Self {
        self.retry_tries = Some(tries);
        self
    }

    /// Set the initial delay before the first retry.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Set the backoff multiplier applied after each failed attempt.
    pub fn retry_backoff(mut self, factor: f64) -> Self {
        self.retry_backoff = Some(factor);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DownloaderConfig {
        DownloaderConfig {
            proxy_enabled: self.proxy_enabled.unwrap_or(true),
            max_reuse: self.max_reuse.unwrap_or(10),
            pool_capacity: self.pool_capacity.unwrap_or(20),
            proxy_source_url: self.proxy_source_url.unwrap_or_default(),
            cookie_enabled: self.cookie_enabled.unwrap_or(false),
            timeout: self.timeout.unwrap_or(Duration::from_secs(30)),
            user_agent: self.user_agent.unwrap_or_else(|| {
                "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0"
                    .to_string()
            }),
            allow_redirects: self.allow_redirects.unwrap_or(true),
            retry_tries: self.retry_tries.unwrap_or(2),
            retry_delay: self.retry_delay.unwrap_or(Duration::from_secs(1)),
            retry_backoff: self.retry_backoff.unwrap_or(2.0),
        }
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
