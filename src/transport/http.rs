use async_trait::async_trait;
use futures::TryStreamExt;
use std::time::Duration;

use super::{HttpRequest, HttpResponse, StreamingResponse, Transport, TransportError};

pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 32;
pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Connection settings for [`HttpTransport`]. Filled in by `ClientBuilder`.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub verify_tls: bool,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: crate::config::DEFAULT_TIMEOUT,
            verify_tls: true,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            proxy: None,
        }
    }
}

/// reqwest-backed transport with a shared connection pool.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the pooled client. An unparsable proxy URL is an error.
    pub fn new(settings: &HttpSettings) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .pool_idle_timeout(Some(settings.pool_idle_timeout))
            .redirect(reqwest::redirect::Policy::limited(10));

        if !settings.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(proxy_url) = &settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        let client = builder.build()?;
        Ok(Self { client })
    }

    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            req = req.body(body);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        req
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let resp = self.prepare(request).send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let resp = self.prepare(request).send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = Box::pin(resp.bytes_stream().map_err(TransportError::Http));
        Ok(StreamingResponse {
            status,
            headers,
            body,
        })
    }
}
