//! Shared fixtures: a mockito server wrapper and a scripted in-process transport.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use mockito::{Server, ServerGuard};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ttkia_sdk::transport::{
    HttpRequest, HttpResponse, StreamingResponse, Transport, TransportError,
};
use ttkia_sdk::{Client, RetryPolicy};

pub const TEST_API_KEY: &str = "ttkia_sk_test_0123456789";
pub const TEST_TOKEN: &str = "app-token-abc";

/// A full `/query_complete` payload as the backend sends it.
pub fn query_payload(conversation_id: &str, text: &str) -> Value {
    json!({
        "success": true,
        "conversation_id": conversation_id,
        "message_id": "msg-456",
        "query": "What is BGP?",
        "response_text": text,
        "confidence": 0.85,
        "recommended_response": null,
        "query_extended": null,
        "token_counts": {"input": 500, "output": 200},
        "timing": [{"retrieve": 0.5}, {"textual": 2.1}, {"analyze": 0.3}],
        "inferred_environments": ["networking"],
        "docs": [{"title": "BGP Guide", "source": "bgp.pdf", "environment": "networking"}],
        "webs": [],
        "links": [],
        "thinking_process": [],
        "error": null
    })
}

/// Test fixture that manages a mock server.
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Client against the mock server with an API key and fast, deterministic retries.
    pub fn client(&self) -> Client {
        Client::builder(&self.base_url)
            .api_key(TEST_API_KEY)
            .retry_policy(fast_retries())
            .build()
            .expect("client builds")
    }
}

pub fn fast_retries() -> RetryPolicy {
    RetryPolicy::default()
        .with_base_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
        .with_jitter(false)
}

/// What the scripted transport does for one call.
#[derive(Clone, Debug)]
pub enum Step {
    Respond {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    },
    /// Answer a query by echoing its `query` and `conversation_id` back.
    Echo,
    /// Network-level failure.
    Fail(String),
}

impl Step {
    pub fn json(status: u16, body: Value) -> Self {
        Step::Respond {
            status,
            headers: vec![("content-type", "application/json".to_string())],
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            body: json!({"detail": format!("status {}", status)}).to_string(),
        }
    }

    pub fn retry_after(self, secs: u64) -> Self {
        match self {
            Step::Respond {
                status,
                mut headers,
                body,
            } => {
                headers.push(("retry-after", secs.to_string()));
                Step::Respond {
                    status,
                    headers,
                    body,
                }
            }
            other => other,
        }
    }

    pub fn sse(frames: &[(&str, Value)]) -> Self {
        let body = frames
            .iter()
            .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
            .collect::<String>();
        Step::Respond {
            status: 200,
            headers: vec![("content-type", "text/event-stream".to_string())],
            body,
        }
    }
}

/// One request as the transport saw it.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    pub at: tokio::time::Instant,
}

/// In-process transport that replays a script and records every call.
///
/// When the script runs out, `fallback` is used for every further call.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    recorded: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Self::build(steps, Step::status(500), Duration::ZERO)
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::build(Vec::new(), step, Duration::ZERO)
    }

    pub fn echo_with_latency(latency: Duration) -> Arc<Self> {
        Self::build(Vec::new(), Step::Echo, latency)
    }

    fn build(steps: Vec<Step>, fallback: Step, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            fallback,
            latency,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn client(self: &Arc<Self>) -> Client {
        self.client_with(|b| b)
    }

    pub fn client_with(
        self: &Arc<Self>,
        configure: impl FnOnce(ttkia_sdk::ClientBuilder) -> ttkia_sdk::ClientBuilder,
    ) -> Client {
        let builder = Client::builder("https://ttkia.test")
            .api_key(TEST_API_KEY)
            .retry_policy(RetryPolicy::default().with_jitter(false))
            .transport(self.clone());
        configure(builder).build().expect("client builds")
    }

    async fn run(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        let body: Option<Value> = request
            .body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok());
        self.recorded.lock().unwrap().push(Recorded {
            method: request.method.to_string(),
            path: request.url.path().to_string(),
            headers: request.headers.clone(),
            body: body.clone(),
            timeout: request.timeout,
            at: tokio::time::Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step {
            Step::Fail(msg) => Err(TransportError::Other(msg)),
            Step::Echo => {
                let body = body.unwrap_or(Value::Null);
                let conversation_id = body
                    .get("conversation_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("conv-{}", uuid::Uuid::new_v4()));
                let query = body.get("query").and_then(Value::as_str).unwrap_or("");
                let mut payload = query_payload(&conversation_id, &format!("answer to {}", query));
                payload["query"] = json!(query);
                Ok(HttpResponse {
                    status: 200,
                    headers: HeaderMap::new(),
                    body: Bytes::from(payload.to_string()),
                })
            }
            Step::Respond {
                status,
                headers,
                body,
            } => {
                let mut map = HeaderMap::new();
                for (k, v) in headers {
                    map.insert(
                        HeaderName::from_static(k),
                        HeaderValue::from_str(&v).expect("header value"),
                    );
                }
                Ok(HttpResponse {
                    status,
                    headers: map,
                    body: Bytes::from(body),
                })
            }
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.run(request).await
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let resp = self.run(request).await?;
        // Deliver the body in small pieces to exercise frame reassembly.
        let chunks: Vec<Result<Bytes, TransportError>> = resp
            .body
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(StreamingResponse {
            status: resp.status,
            headers: resp.headers,
            body: Box::pin(stream::iter(chunks)),
        })
    }
}
