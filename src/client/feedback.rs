use crate::client::core::Client;
use crate::client::endpoint::Endpoint;
use crate::decode::decode_feedback_ack;
use crate::types::{Feedback, FeedbackAck};
use crate::Result;

impl Client {
    /// Rate an assistant message. Each call records a new entry; nothing is deduplicated.
    pub async fn feedback(&self, feedback: &Feedback) -> Result<FeedbackAck> {
        let payload = feedback.to_payload()?;
        let resp = self.execute(Endpoint::Feedback, Some(&payload)).await?;
        decode_feedback_ack(&resp.body)
    }
}
