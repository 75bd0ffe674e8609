use std::{sync::OnceLock, time::Duration};

use regex::Regex;

use crate::{
    cache_key::{CacheKeyGenerator, Md5CacheKeyGenerator},
    transport::Transport,
    Client, Error, Result,
};

/// Configuration for [`Client`].
///
/// # Examples
/// ```no_run
/// # use hyphen::ClientConfig;
/// let client = ClientConfig::from_public_key("public_key")
///     .application("my-app")
///     .environment("production")
///     .to_client()
///     .unwrap();
/// ```
pub struct ClientConfig {
    pub(crate) public_key: String,
    pub(crate) application: String,
    pub(crate) environment: String,
    pub(crate) horizon_urls: Vec<String>,
    pub(crate) cache_ttl: Duration,
    pub(crate) cache_key_generator: Box<dyn CacheKeyGenerator + Send + Sync>,
    pub(crate) enable_toggle_usage: bool,
    pub(crate) request_timeout: Duration,
    pub(crate) transport: Option<Box<dyn Transport + Send + Sync>>,
}

impl ClientConfig {
    /// Default value for [`ClientConfig::cache_ttl`].
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
    /// Default value for [`ClientConfig::request_timeout`].
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a default configuration using the specified public key.
    ///
    /// ```
    /// # use hyphen::ClientConfig;
    /// ClientConfig::from_public_key("public_key");
    /// ```
    pub fn from_public_key(public_key: impl Into<String>) -> Self {
        ClientConfig {
            public_key: public_key.into(),
            application: String::new(),
            environment: String::new(),
            horizon_urls: Vec::new(),
            cache_ttl: ClientConfig::DEFAULT_CACHE_TTL,
            cache_key_generator: Box::new(Md5CacheKeyGenerator),
            enable_toggle_usage: true,
            request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
            transport: None,
        }
    }

    /// Set application id. Required.
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    /// Set environment: a project environment id (`pevr_...`) or an alternate id such as
    /// `production`. Required.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Horizon URLs to try, in order, before the default one derived from the public key.
    pub fn horizon_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.horizon_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// How long evaluation responses are reused. Zero disables caching.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Replace the default cache key derivation.
    ///
    /// ```
    /// # use hyphen::{ClientConfig, EvaluationContext};
    /// // Share cached responses between all contexts with the same targeting key.
    /// let config = ClientConfig::from_public_key("public_key")
    ///     .cache_key_generator(|context: &EvaluationContext| context.targeting_key.clone());
    /// ```
    pub fn cache_key_generator(
        mut self,
        generator: impl CacheKeyGenerator + Send + Sync + 'static,
    ) -> Self {
        self.cache_key_generator = Box::new(generator);
        self
    }

    /// Send usage telemetry for every resolved toggle. Enabled by default.
    pub fn enable_toggle_usage(mut self, enable: bool) -> Self {
        self.enable_toggle_usage = enable;
        self
    }

    /// Timeout for each request to a single horizon endpoint.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replace the HTTP transport. [`HttpTransport`](crate::HttpTransport) is used by default.
    pub fn transport(mut self, transport: impl Transport + Send + Sync + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Create a new [`Client`] using this configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] if application or environment is missing or malformed.
    /// - [`Error::InvalidBaseUrl`] if a horizon URL cannot be parsed.
    /// - [`Error::InvalidApiKey`] if the public key cannot be sent as a header.
    pub fn to_client(self) -> Result<Client> {
        Client::new(self)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.application.is_empty() {
            return Err(Error::InvalidConfiguration("application is required"));
        }
        if self.environment.is_empty() {
            return Err(Error::InvalidConfiguration("environment is required"));
        }
        if !is_valid_environment(&self.environment) {
            return Err(Error::InvalidConfiguration(
                "invalid environment format, expected a project environment id (pevr_...) or an alternate id",
            ));
        }
        Ok(())
    }
}

/// Environment is either a project environment id or an alternate id: at most 25 lowercase
/// letters, digits, `-` or `_`, and not containing `environments`.
fn is_valid_environment(environment: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(pevr_[0-9a-z]+|[0-9a-z_-]{1,25})$")
            .expect("environment pattern should be valid")
    });
    pattern.is_match(environment) && !environment.contains("environments")
}
