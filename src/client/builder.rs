use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::auth::Credential;
use crate::client::core::{Client, ClientInner};
use crate::client::policy::RetryPolicy;
use crate::config::{ClientConfig, DEFAULT_HEALTH_TIMEOUT, DEFAULT_TIMEOUT};
use crate::transport::{
    HttpSettings, HttpTransport, Transport, DEFAULT_POOL_IDLE_TIMEOUT, DEFAULT_POOL_MAX_IDLE_PER_HOST,
};
use crate::{Error, ErrorContext, Result};

/// Builder for [`Client`].
///
/// Credentials are checked in [`build`](Self::build), so a misconfigured
/// client never reaches the network.
pub struct ClientBuilder {
    base_url: String,
    api_key: Option<String>,
    bearer_token: Option<String>,
    timeout: Duration,
    health_timeout: Duration,
    verify_tls: bool,
    proxy: Option<String>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Duration,
    retry: RetryPolicy,
    max_inflight: Option<usize>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            verify_tls: true,
            proxy: None,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            retry: RetryPolicy::default(),
            max_inflight: None,
            transport: None,
        }
    }

    /// Start from resolved configuration (see [`crate::config::resolve`]).
    pub fn from_config(config: ClientConfig) -> Self {
        let mut b = Self::new(config.base_url)
            .timeout(config.timeout)
            .verify_tls(config.verify_tls);
        b.api_key = config.api_key;
        b.bearer_token = config.bearer_token;
        b.proxy = config.proxy;
        b
    }

    /// API key (`ttkia_sk_…`). Takes precedence over a bearer token.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Per-request timeout (default 120 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeout for `health()` (default 10 s).
    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Route every request through this HTTP(S) proxy.
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Idle connections kept per host (default 32).
    pub fn pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    /// How long an idle pooled connection is kept (default 90 s).
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Limit concurrent transport attempts across all clones of the client.
    /// No limit by default.
    pub fn max_inflight(mut self, n: usize) -> Self {
        self.max_inflight = Some(n.max(1));
        self
    }

    /// Use a custom transport instead of the default reqwest one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client> {
        let base_url = parse_base_url(&self.base_url)?;
        let credential = Credential::resolve(self.api_key, self.bearer_token)?;

        if self.timeout.is_zero() || self.health_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "Timeouts must be greater than zero",
                ErrorContext::new()
                    .with_field_path("timeout")
                    .with_source("client_builder"),
            ));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => {
                let settings = HttpSettings {
                    timeout: self.timeout,
                    verify_tls: self.verify_tls,
                    pool_max_idle_per_host: self.pool_max_idle_per_host,
                    pool_idle_timeout: self.pool_idle_timeout,
                    proxy: self.proxy,
                };
                Arc::new(HttpTransport::new(&settings).map_err(|e| {
                    Error::configuration_with_context(
                        format!("Failed to create HTTP client: {}", e),
                        ErrorContext::new().with_source("client_builder"),
                    )
                })?)
            }
        };

        Ok(Client {
            inner: Arc::new(ClientInner::new(
                base_url,
                credential,
                self.retry,
                self.health_timeout,
                transport,
                self.max_inflight,
            )),
        })
    }
}

/// Parse and normalize the service root. A trailing slash is dropped so route
/// segments append cleanly.
fn parse_base_url(raw: &str) -> Result<Url> {
    let invalid = |msg: String| {
        Error::configuration_with_context(
            msg,
            ErrorContext::new()
                .with_field_path("base_url")
                .with_details(raw.to_string())
                .with_source("client_builder"),
        )
    };

    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(invalid("Base URL is required".to_string()));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(format!("Invalid base URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid(format!("Unsupported base URL scheme '{}'", url.scheme())));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let url = parse_base_url(" https://ttkia.example.com/api/ ").unwrap();
        assert_eq!(url.as_str(), "https://ttkia.example.com/api");
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        assert!(matches!(parse_base_url(""), Err(Error::Configuration { .. })));
        assert!(matches!(parse_base_url("not a url"), Err(Error::Configuration { .. })));
        assert!(matches!(parse_base_url("ftp://host"), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_build_requires_a_credential() {
        let err = ClientBuilder::new("https://ttkia.example.com").build().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_api_key_wins_over_bearer() {
        let client = ClientBuilder::new("https://ttkia.example.com")
            .api_key("ttkia_sk_abc")
            .bearer_token("jwt")
            .build()
            .unwrap();
        assert_eq!(client.auth_kind(), "api_key");
        assert!(client.inflight().is_none());
    }

    #[test]
    fn test_bad_proxy_is_configuration_error() {
        let err = ClientBuilder::new("https://ttkia.example.com")
            .bearer_token("jwt")
            .proxy("http://bad host:3128")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let cfg = crate::config::resolve(&[crate::config::ConfigLayer::new()
            .with_url("https://ttkia.example.com")
            .with_token("jwt")
            .with_proxy("http://proxy.internal:3128")])
        .unwrap();
        assert!(Client::from_config(cfg).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ClientBuilder::new("https://ttkia.example.com")
            .bearer_token("jwt")
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
