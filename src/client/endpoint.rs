//! Backend routes.

use reqwest::Method;

/// One backend route. Paths are relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Health,
    QueryComplete,
    QueryStream,
    /// Environments and conversation listing share one route.
    GetEnv,
    GetPrompts,
    GetStyles,
    ConversationInfo,
    NewWorkspace,
    DeleteConversation,
    Feedback,
    ExportConversation(String),
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Health
            | Endpoint::GetEnv
            | Endpoint::GetPrompts
            | Endpoint::GetStyles
            | Endpoint::ExportConversation(_) => Method::GET,
            Endpoint::QueryComplete
            | Endpoint::QueryStream
            | Endpoint::ConversationInfo
            | Endpoint::NewWorkspace
            | Endpoint::DeleteConversation
            | Endpoint::Feedback => Method::POST,
        }
    }

    /// Media type sent in `Accept`.
    pub fn accept(&self) -> &'static str {
        match self {
            Endpoint::QueryStream => "text/event-stream",
            Endpoint::ExportConversation(_) => "*/*",
            _ => "application/json",
        }
    }

    /// Raw path segments. Each one is percent-encoded when joined onto the base URL.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Endpoint::Health => vec!["health"],
            Endpoint::QueryComplete => vec!["query_complete"],
            Endpoint::QueryStream => vec!["query_stream"],
            Endpoint::GetEnv => vec!["get_env"],
            Endpoint::GetPrompts => vec!["get_prompts"],
            Endpoint::GetStyles => vec!["get_styles"],
            Endpoint::ConversationInfo => vec!["conversation-info"],
            Endpoint::NewWorkspace => vec!["new-workspace"],
            Endpoint::DeleteConversation => vec!["delete_conversation"],
            Endpoint::Feedback => vec!["feedback"],
            Endpoint::ExportConversation(id) => vec!["export-conversation", id.as_str()],
        }
    }

    /// Route label for logs. Conversation ids are left out.
    pub fn label(&self) -> &'static str {
        match self {
            Endpoint::Health => "/health",
            Endpoint::QueryComplete => "/query_complete",
            Endpoint::QueryStream => "/query_stream",
            Endpoint::GetEnv => "/get_env",
            Endpoint::GetPrompts => "/get_prompts",
            Endpoint::GetStyles => "/get_styles",
            Endpoint::ConversationInfo => "/conversation-info",
            Endpoint::NewWorkspace => "/new-workspace",
            Endpoint::DeleteConversation => "/delete_conversation",
            Endpoint::Feedback => "/feedback",
            Endpoint::ExportConversation(_) => "/export-conversation",
        }
    }
}
