use serde::{Deserialize, Serialize};

/// Service health as reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default = "unknown")]
    pub backend: String,
    #[serde(default = "unknown")]
    pub embedding: String,
    #[serde(default = "unknown", rename = "qdrant", alias = "vector_store")]
    pub vector_store: String,
    #[serde(default)]
    pub detail: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "ok")
    }
}

/// A prompt template or response style offered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    /// The entry's `id`, or its `name` when no id is given.
    pub id: String,
    pub description: Option<String>,
    /// Remaining fields, untouched.
    pub extra: serde_json::Map<String, serde_json::Value>,
}
