use futures::StreamExt;
use serde_json::json;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::client::core::Client;
use crate::client::endpoint::Endpoint;
use crate::decode::{decode_conversation, decode_conversation_list, decode_created_conversation};
use crate::types::{Conversation, ConversationSummary};
use crate::{Error, ErrorContext, Result};

pub(crate) fn require_id<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation_with_context(
            format!("{} must not be empty", field),
            ErrorContext::new()
                .with_field_path(field)
                .with_source("client"),
        ));
    }
    Ok(trimmed)
}

impl Client {
    /// The caller's conversations, in server order.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let resp = self.execute(Endpoint::GetEnv, None).await?;
        decode_conversation_list(&resp.body)
    }

    /// Full conversation with its messages.
    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        let id = require_id(conversation_id, "conversation_id")?;
        let body = json!({ "conversation_id": id });
        let resp = self.execute(Endpoint::ConversationInfo, Some(&body)).await?;
        decode_conversation(&resp.body)
    }

    /// Create an empty conversation and return its server-assigned id.
    pub async fn create_conversation(&self, title: Option<&str>) -> Result<String> {
        let body = match title {
            Some(t) => json!({ "title": t }),
            None => json!({}),
        };
        let resp = self.execute(Endpoint::NewWorkspace, Some(&body)).await?;
        decode_created_conversation(&resp.body)
    }

    /// Delete a conversation. An unknown id surfaces as [`Error::NotFound`].
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let id = require_id(conversation_id, "conversation_id")?;
        let body = json!({ "conversation_id": id });
        self.execute(Endpoint::DeleteConversation, Some(&body)).await?;
        debug!(conversation_id = id, "ttkia conversation deleted");
        Ok(())
    }

    /// Download a conversation export and write it verbatim to `dest`.
    ///
    /// Returns the number of bytes written. A partially written file is
    /// removed when the download or the write fails.
    pub async fn export_conversation(
        &self,
        conversation_id: &str,
        dest: impl AsRef<Path>,
    ) -> Result<u64> {
        let id = require_id(conversation_id, "conversation_id")?;
        let dest = dest.as_ref();
        let open = self
            .execute_streaming(Endpoint::ExportConversation(id.to_string()), None)
            .await?;
        let _permit = open.permit;
        let mut body = open.response.body;

        let io_err = |source: std::io::Error| Error::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;

        let mut written: u64 = 0;
        let outcome: Result<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await.map_err(io_err)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(io_err)
        }
        .await;

        if let Err(e) = outcome {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(dest).await {
                warn!(path = %dest.display(), error = %rm, "failed to remove partial export");
            }
            return Err(e);
        }
        debug!(conversation_id = id, bytes = written, path = %dest.display(), "ttkia conversation exported");
        Ok(written)
    }
}
