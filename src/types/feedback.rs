use serde::Serialize;

use crate::{Error, ErrorContext, Result};

/// Thumbs-up/down feedback on one assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub conversation_id: String,
    pub message_id: String,
    pub positive: bool,
    pub comment: Option<String>,
    pub inferred_environments: Vec<String>,
}

impl Feedback {
    pub fn new(conversation_id: impl Into<String>, message_id: impl Into<String>, positive: bool) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            positive,
            comment: None,
            inferred_environments: Vec::new(),
        }
    }

    pub fn positive(conversation_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::new(conversation_id, message_id, true)
    }

    pub fn negative(conversation_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self::new(conversation_id, message_id, false)
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_environments(mut self, envs: Vec<String>) -> Self {
        self.inferred_environments = envs;
        self
    }

    pub(crate) fn to_payload(&self) -> Result<serde_json::Value> {
        for (field, value) in [
            ("conversation_id", &self.conversation_id),
            ("message_id", &self.message_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation_with_context(
                    format!("{} is required for feedback", field),
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("feedback"),
                ));
            }
        }
        Ok(serde_json::json!({
            "feedback": self.positive,
            "conversation_id": self.conversation_id,
            "message_id": self.message_id,
            "comment": self.comment.as_deref().unwrap_or(""),
            "inferred_environments": self.inferred_environments,
        }))
    }
}

/// Server acknowledgement of a feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackAck {
    pub success: bool,
    pub message: String,
}
