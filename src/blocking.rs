//! Blocking TTKIA client.
//!
//! Mirrors [`crate::Client`] one-to-one: same operations, result types, errors
//! and retry behavior. Each call drives the async client to completion on a
//! private current-thread runtime, so it must not be used from inside an async
//! context.
//!
//! ```rust,no_run
//! use ttkia_sdk::blocking::Client;
//! use ttkia_sdk::types::QueryRequest;
//!
//! # fn main() -> ttkia_sdk::Result<()> {
//! let client = Client::builder("https://ttkia.example.com")
//!     .api_key("ttkia_sk_...")
//!     .build_blocking()?;
//! let answer = client.query(&QueryRequest::new("What is BGP?"))?;
//! println!("{}", answer.text);
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::client::{ClientBuilder, InflightSnapshot, RetryPolicy};
use crate::config::ClientConfig;
use crate::types::{
    CatalogEntry, Conversation, ConversationSummary, Feedback, FeedbackAck, HealthStatus,
    QueryRequest, QueryResponse, StreamEvent,
};
use crate::{Error, ErrorContext, Result};

/// Blocking client. Clones share the connection pool and runtime.
#[derive(Clone, Debug)]
pub struct Client {
    inner: crate::Client,
    rt: Arc<Runtime>,
}

impl ClientBuilder {
    /// Build a [`blocking::Client`](Client).
    pub fn build_blocking(self) -> Result<Client> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("Failed to start runtime: {}", e),
                    ErrorContext::new().with_source("blocking_client"),
                )
            })?;
        Ok(Client {
            inner: self.build()?,
            rt: Arc::new(rt),
        })
    }
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::from_config(config).build_blocking()
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.rt.block_on(fut)
    }

    /// The async client this one drives.
    pub fn as_async(&self) -> &crate::Client {
        &self.inner
    }

    pub fn base_url(&self) -> &url::Url {
        self.inner.base_url()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.inner.retry_policy()
    }

    pub fn close(&self) -> bool {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn inflight(&self) -> Option<InflightSnapshot> {
        self.inner.inflight()
    }

    pub fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.block_on(self.inner.query(request))
    }

    /// Streaming query as an iterator of events.
    pub fn query_stream(&self, request: &QueryRequest) -> Result<QueryStream<'_>> {
        let stream = self.block_on(self.inner.query_stream(request))?;
        Ok(QueryStream {
            rt: &self.rt,
            stream,
        })
    }

    pub fn health(&self) -> Result<HealthStatus> {
        self.block_on(self.inner.health())
    }

    pub fn get_environments(&self) -> Result<Vec<String>> {
        self.block_on(self.inner.get_environments())
    }

    pub fn get_prompts(&self) -> Result<Vec<CatalogEntry>> {
        self.block_on(self.inner.get_prompts())
    }

    pub fn get_styles(&self) -> Result<Vec<CatalogEntry>> {
        self.block_on(self.inner.get_styles())
    }

    pub fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.block_on(self.inner.list_conversations())
    }

    pub fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.block_on(self.inner.get_conversation(conversation_id))
    }

    pub fn create_conversation(&self, title: Option<&str>) -> Result<String> {
        self.block_on(self.inner.create_conversation(title))
    }

    pub fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        self.block_on(self.inner.delete_conversation(conversation_id))
    }

    pub fn feedback(&self, feedback: &Feedback) -> Result<FeedbackAck> {
        self.block_on(self.inner.feedback(feedback))
    }

    pub fn export_conversation(&self, conversation_id: &str, dest: impl AsRef<Path>) -> Result<u64> {
        self.block_on(self.inner.export_conversation(conversation_id, dest))
    }
}

/// Blocking iterator over a streaming query's events.
pub struct QueryStream<'a> {
    rt: &'a Runtime,
    stream: crate::client::QueryStream,
}

impl Iterator for QueryStream<'_> {
    type Item = Result<StreamEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rt.block_on(self.stream.next())
    }
}
