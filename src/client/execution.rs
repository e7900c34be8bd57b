//! 请求执行：单次尝试与重试循环。
//!
//! Request execution: one attempt, and the retry loop around it.

use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::client::core::Client;
use crate::client::endpoint::Endpoint;
use crate::client::error_classification::{classify, error_class};
use crate::client::policy::{RetryPolicy, RetryState};
use crate::transport::{HttpRequest, HttpResponse, StreamingResponse, Transport};
use crate::{Error, ErrorContext, Result};

const REQUEST_ID_HEADER: &str = "x-request-id";
const SDK_USER_AGENT: &str = concat!("ttkia-sdk-rust/", env!("CARGO_PKG_VERSION"));

/// One failed attempt, with the server's requested wait if it sent one.
struct AttemptError {
    error: Error,
    retry_after: Option<Duration>,
}

impl From<Error> for AttemptError {
    fn from(error: Error) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// A streaming response plus the in-flight permit it holds until dropped.
pub(crate) struct OpenStream {
    pub response: StreamingResponse,
    pub permit: Option<OwnedSemaphorePermit>,
}

impl Client {
    /// Buffered call with the client's retry policy and timeout.
    pub(crate) async fn execute(
        &self,
        endpoint: Endpoint,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse> {
        let policy = self.inner.retry.clone();
        self.execute_with(endpoint, body, None, &policy).await
    }

    pub(crate) async fn execute_with(
        &self,
        endpoint: Endpoint,
        body: Option<&serde_json::Value>,
        timeout: Option<Duration>,
        policy: &RetryPolicy,
    ) -> Result<HttpResponse> {
        let handle = self.transport()?;
        let transport: &dyn Transport = &**handle;
        let body = encode_body(body)?;
        self.with_retry(&endpoint, policy, |attempt| {
            self.send_once(transport, &endpoint, body.clone(), timeout, attempt)
        })
        .await
    }

    /// Open a streaming response, retrying until the status line is a success.
    /// Failures after the body starts are not retried.
    pub(crate) async fn execute_streaming(
        &self,
        endpoint: Endpoint,
        body: Option<&serde_json::Value>,
    ) -> Result<OpenStream> {
        let handle = self.transport()?;
        let transport: &dyn Transport = &**handle;
        let body = encode_body(body)?;
        let policy = self.inner.retry.clone();
        self.with_retry(&endpoint, &policy, |attempt| {
            self.open_once(transport, &endpoint, body.clone(), attempt)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(
        &self,
        endpoint: &Endpoint,
        policy: &RetryPolicy,
        mut attempt_fn: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        let mut state = RetryState::start();
        let mut last_retry_after: Option<Duration> = None;
        loop {
            match attempt_fn(state.attempt()).await {
                Ok(value) => {
                    state = state.on_success();
                    debug!(endpoint = endpoint.label(), attempts = state.attempt(), "ttkia call succeeded");
                    return Ok(value);
                }
                Err(failure) => {
                    if failure.retry_after.is_some() {
                        last_retry_after = failure.retry_after;
                    }
                    let decision = policy.decide(&failure.error, failure.retry_after, state.attempt());
                    state = state.on_failure(decision);
                    match state {
                        RetryState::Waiting { attempt, delay } => {
                            warn!(
                                endpoint = endpoint.label(),
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %failure.error,
                                "ttkia call failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            state = state.on_wake();
                        }
                        _ => {
                            let mut error = failure.error;
                            if let Error::RateLimit { retry_after, .. } = &mut error {
                                if retry_after.is_none() {
                                    *retry_after = last_retry_after.map(|d| d.as_secs());
                                }
                            }
                            if error.is_retryable() {
                                warn!(
                                    endpoint = endpoint.label(),
                                    attempts = state.attempt(),
                                    error = %error,
                                    "ttkia call gave up"
                                );
                            }
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    async fn send_once(
        &self,
        transport: &dyn Transport,
        endpoint: &Endpoint,
        body: Option<Bytes>,
        timeout: Option<Duration>,
        attempt: u32,
    ) -> std::result::Result<HttpResponse, AttemptError> {
        let _permit = self.acquire_permit().await?;
        let client_request_id = Uuid::new_v4().to_string();
        let request = self.build_request(endpoint, body, timeout, &client_request_id)?;

        let start = Instant::now();
        let resp = match transport.send(request).await {
            Ok(resp) => resp,
            Err(e) => {
                info!(
                    endpoint = endpoint.label(),
                    attempt,
                    client_request_id = client_request_id.as_str(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    timeout = e.is_timeout(),
                    "ttkia request transport failure"
                );
                return Err(Error::Transport(e).into());
            }
        };

        if resp.is_success() {
            debug!(
                http_status = resp.status,
                endpoint = endpoint.label(),
                attempt,
                duration_ms = start.elapsed().as_millis() as u64,
                "ttkia request"
            );
            return Ok(resp);
        }
        Err(self.failed_attempt(endpoint, resp.status, &resp.headers, &resp.body, start, attempt, &client_request_id))
    }

    async fn open_once(
        &self,
        transport: &dyn Transport,
        endpoint: &Endpoint,
        body: Option<Bytes>,
        attempt: u32,
    ) -> std::result::Result<OpenStream, AttemptError> {
        let permit = self.acquire_permit().await?;
        let client_request_id = Uuid::new_v4().to_string();
        let request = self.build_request(endpoint, body, None, &client_request_id)?;

        let start = Instant::now();
        let resp = transport
            .send_streaming(request)
            .await
            .map_err(|e| AttemptError::from(Error::Transport(e)))?;

        if (200..300).contains(&resp.status) {
            debug!(
                http_status = resp.status,
                endpoint = endpoint.label(),
                attempt,
                "ttkia stream opened"
            );
            return Ok(OpenStream {
                response: resp,
                permit,
            });
        }

        let StreamingResponse {
            status,
            headers,
            body,
        } = resp;
        let chunks: Vec<Bytes> = body
            .try_collect()
            .await
            .map_err(|e| AttemptError::from(Error::Transport(e)))?;
        let body = chunks.concat();
        Err(self.failed_attempt(endpoint, status, &headers, &body, start, attempt, &client_request_id))
    }

    #[allow(clippy::too_many_arguments)]
    fn failed_attempt(
        &self,
        endpoint: &Endpoint,
        status: u16,
        headers: &HeaderMap,
        body: &[u8],
        start: Instant,
        attempt: u32,
        client_request_id: &str,
    ) -> AttemptError {
        let retry_after = retry_after_secs(headers);
        let upstream = header_first(headers, &[REQUEST_ID_HEADER, "request-id", "cf-ray"]);
        info!(
            http_status = status,
            error_class = error_class(status),
            endpoint = endpoint.label(),
            attempt,
            duration_ms = start.elapsed().as_millis() as u64,
            client_request_id,
            upstream_request_id = upstream.as_deref().unwrap_or(""),
            "ttkia request failed"
        );
        AttemptError {
            error: classify(status, body, retry_after),
            retry_after: retry_after.map(Duration::from_secs),
        }
    }

    fn build_request(
        &self,
        endpoint: &Endpoint,
        body: Option<Bytes>,
        timeout: Option<Duration>,
        client_request_id: &str,
    ) -> Result<HttpRequest> {
        let url = self.url_for(endpoint)?;

        let mut headers = HeaderMap::new();
        let (auth_name, auth_value) = self.inner.credential.header()?;
        headers.insert(auth_name, auth_value);
        headers.insert(ACCEPT, HeaderValue::from_static(endpoint.accept()));
        headers.insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));
        if let Ok(v) = HeaderValue::from_str(client_request_id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), v);
        }
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(HttpRequest {
            method: endpoint.method(),
            url,
            headers,
            body,
            timeout,
        })
    }

    pub(crate) fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::configuration_with_context(
                    "Base URL cannot carry a path",
                    ErrorContext::new().with_field_path("base_url"),
                )
            })?
            .pop_if_empty()
            .extend(endpoint.segments());
        Ok(url)
    }
}

fn encode_body(body: Option<&serde_json::Value>) -> Result<Option<Bytes>> {
    body.map(|v| {
        serde_json::to_vec(v).map(Bytes::from).map_err(|e| {
            Error::validation_with_context(
                format!("Failed to encode request body: {}", e),
                ErrorContext::new().with_source("request_encoder"),
            )
        })
    })
    .transpose()
}

fn header_first(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(v) = headers.get(*name) {
            if let Ok(s) = v.to_str() {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}

/// `Retry-After` in seconds. Only the delta-seconds form is understood;
/// fractional values round up.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    let raw = header_first(headers, &["retry-after"])?;
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(secs);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f.ceil() as u64)
}
