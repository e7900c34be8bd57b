//! Query request and result types.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::{Error, ErrorContext, Result};

pub const DEFAULT_PROMPT: &str = "default";
pub const DEFAULT_STYLE: &str = "concise";

/// A natural-language query plus its options.
///
/// Leaving `conversation_id` unset starts a new conversation; the server
/// allocates the id and returns it in [`QueryResponse::conversation_id`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub conversation_id: Option<String>,
    pub prompt: String,
    pub style: String,
    pub web_search: bool,
    /// Ask the backend for its chain-of-thought trace.
    pub teacher_mode: bool,
    /// Restrict retrieval to these document identifiers.
    pub sources: Vec<String>,
    /// Title for a newly created conversation. Ignored when continuing one.
    pub title: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: None,
            prompt: DEFAULT_PROMPT.to_string(),
            style: DEFAULT_STYLE.to_string(),
            web_search: false,
            teacher_mode: false,
            sources: Vec::new(),
            title: None,
        }
    }

    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn web_search(mut self, enable: bool) -> Self {
        self.web_search = enable;
        self
    }

    pub fn teacher_mode(mut self, enable: bool) -> Self {
        self.teacher_mode = enable;
        self
    }

    /// Set the source filter. Duplicates are dropped, first occurrence kept.
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for s in sources {
            let s = s.into();
            if !out.contains(&s) {
                out.push(s);
            }
        }
        self.sources = out;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Check the request and build the wire payload.
    pub(crate) fn to_payload(&self) -> Result<serde_json::Value> {
        if self.query.trim().is_empty() {
            return Err(Error::validation_with_context(
                "Query text must not be empty",
                ErrorContext::new()
                    .with_field_path("query")
                    .with_source("query_request"),
            ));
        }
        if let Some(id) = &self.conversation_id {
            if id.trim().is_empty() {
                return Err(Error::validation_with_context(
                    "conversation_id must not be blank when provided",
                    ErrorContext::new()
                        .with_field_path("conversation_id")
                        .with_source("query_request"),
                ));
            }
        }

        let mut payload = serde_json::json!({
            "query": self.query,
            "prompt": self.prompt,
            "style": self.style,
            "web_search": self.web_search,
            "teacher_mode": self.teacher_mode,
            "sources": self.sources,
            "attached_files": [],
            "attached_urls": [],
        });
        if let Some(id) = &self.conversation_id {
            payload["conversation_id"] = serde_json::json!(id);
        }
        if let Some(title) = &self.title {
            payload["title"] = serde_json::json!(title);
        }
        Ok(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Document,
    Web,
}

/// A reference the backend used to ground an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub kind: SourceKind,
    pub title: Option<String>,
    pub source: Option<String>,
    pub environment: Option<String>,
    pub tag: Option<String>,
    pub page: Option<u32>,
}

impl Source {
    pub fn is_web(&self) -> bool {
        self.kind == SourceKind::Web
    }

    /// Title if present, otherwise the raw source identifier.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.source.as_deref())
            .unwrap_or("")
    }
}

/// Token consumption of one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Per-stage execution timing, in seconds, in the order the server reported it.
///
/// Serializes to (and deserializes from) the backend's list-of-single-entry-maps
/// form; the map form is also accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "crate::decode::TimingWire")]
pub struct Timing {
    stages: Vec<(String, f64)>,
}

impl Timing {
    /// Build from `(stage, seconds)` pairs. Durations must be finite and non-negative.
    pub fn from_stages<I, S>(stages: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for (name, secs) in stages {
            let name = name.into();
            if !secs.is_finite() || secs < 0.0 {
                return Err(Error::validation_with_context(
                    "Timing durations must be non-negative",
                    ErrorContext::new()
                        .with_field_path(format!("timing.{}", name))
                        .with_details(secs.to_string())
                        .with_source("timing"),
                ));
            }
            out.push((name, secs));
        }
        Ok(Self { stages: out })
    }

    pub fn stages(&self) -> &[(String, f64)] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Duration of a named stage. A repeated stage name resolves to its last value,
    /// matching [`Timing::summary`].
    pub fn get(&self, name: &str) -> Option<f64> {
        self.stages
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, secs)| *secs)
    }

    /// Sum of all reported stage durations.
    pub fn total_seconds(&self) -> f64 {
        self.stages.iter().map(|(_, secs)| secs).sum()
    }

    /// The stage-name → duration mapping exactly as received.
    pub fn summary(&self) -> BTreeMap<String, f64> {
        self.stages.iter().cloned().collect()
    }
}

impl Serialize for Timing {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.stages.len()))?;
        for (name, secs) in &self.stages {
            let mut entry = BTreeMap::new();
            entry.insert(name.as_str(), *secs);
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}

/// One step of the backend's chain-of-thought trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThinkingStep {
    pub index: usize,
    pub content: String,
}

/// Structured result of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    /// Pipeline error reported by the backend inside a 200 response.
    pub error: Option<String>,
    pub conversation_id: String,
    pub message_id: String,
    pub query: String,
    pub text: String,
    /// Always within `[0.0, 1.0]` when present.
    pub confidence: Option<f64>,
    pub recommended_response: Option<String>,
    pub query_extended: Option<String>,
    pub token_usage: TokenUsage,
    pub timing: Timing,
    pub inferred_environments: Vec<String>,
    pub docs: Vec<Source>,
    pub webs: Vec<Source>,
    pub links: Vec<String>,
    /// Present only when teacher mode was requested and honored.
    pub thinking: Vec<ThinkingStep>,
}

impl QueryResponse {
    pub fn is_error(&self) -> bool {
        !self.success || self.error.is_some()
    }

    /// Documents first, then web results.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.docs.iter().chain(self.webs.iter())
    }

    pub fn source_count(&self) -> usize {
        self.docs.len() + self.webs.len()
    }
}

impl std::fmt::Display for QueryResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_error() {
            return write!(f, "[ERROR] {}", self.error.as_deref().unwrap_or("query failed"));
        }
        let pct = (self.confidence.unwrap_or(0.0) * 100.0).round() as u32;
        let preview: String = self.text.chars().take(200).collect();
        if preview.len() < self.text.len() {
            write!(f, "[{}%] {}...", pct, preview)
        } else {
            write!(f, "[{}%] {}", pct, preview)
        }
    }
}
