use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::debug;

use crate::client::core::Client;
use crate::client::endpoint::Endpoint;
use crate::decode::decode_query;
use crate::sse::decode_events;
use crate::types::{QueryRequest, QueryResponse, StreamEvent};
use crate::Result;

/// Events of a streaming query. Holds its in-flight permit until dropped.
pub type QueryStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'static>>;

impl Client {
    /// Ask a question and wait for the complete answer.
    ///
    /// Without a conversation id the server opens a new conversation; pass the
    /// returned [`QueryResponse::conversation_id`] on the next request to
    /// continue it.
    ///
    /// A pipeline failure reported inside a successful HTTP response is
    /// returned as a response whose [`QueryResponse::is_error`] is true.
    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let payload = request.to_payload()?;
        let resp = self.execute(Endpoint::QueryComplete, Some(&payload)).await?;
        let decoded = decode_query(&resp.body, &request.query)?;
        debug!(
            conversation_id = decoded.conversation_id.as_str(),
            success = decoded.success,
            sources = decoded.source_count(),
            total_tokens = decoded.token_usage.total(),
            "ttkia query decoded"
        );
        Ok(decoded)
    }

    /// Ask a question and receive the answer as server-sent events.
    ///
    /// Retries apply only until the stream opens. The stream ends after the
    /// `done` event.
    pub async fn query_stream(&self, request: &QueryRequest) -> Result<QueryStream> {
        let payload = request.to_payload()?;
        let open = self
            .execute_streaming(Endpoint::QueryStream, Some(&payload))
            .await?;
        let permit = open.permit;
        let events = decode_events(open.response.body).map(move |event| {
            let _held = &permit;
            event
        });
        Ok(Box::pin(events))
    }
}
