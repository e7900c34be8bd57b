use serde::Serialize;

/// Event type of a streaming query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    /// Answer text chunk.
    Text,
    /// Chain-of-thought chunk.
    Thinking,
    ThinkingEnd,
    /// Docs, webs and links.
    Sources,
    /// Conversation id, confidence, timing, tokens.
    Metadata,
    Error,
    Done,
    Other(String),
}

impl StreamEventKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "text" => Self::Text,
            "thinking" => Self::Thinking,
            "thinking_end" => Self::ThinkingEnd,
            "sources" => Self::Sources,
            "metadata" => Self::Metadata,
            "error" => Self::Error,
            "done" => Self::Done,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
    pub data: serde_json::Value,
}

impl StreamEvent {
    pub fn is_text(&self) -> bool {
        self.kind == StreamEventKind::Text
    }

    pub fn is_done(&self) -> bool {
        self.kind == StreamEventKind::Done
    }

    pub fn is_error(&self) -> bool {
        self.kind == StreamEventKind::Error
    }

    /// `data.content` for text and thinking events, empty otherwise.
    pub fn content(&self) -> &str {
        self.data
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

impl std::fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_text() {
            return f.write_str(self.content());
        }
        write!(f, "[{:?}] {}", self.kind, self.data)
    }
}
