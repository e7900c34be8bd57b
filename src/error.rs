use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Structured error context for validation and configuration failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "response.confidence", "config.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "decode_query", "auth_resolver")
    pub source: Option<String>,
    /// HTTP status, when the failure came from a server response
    pub status_code: Option<u16>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// Unified error type for the TTKIA client.
///
/// Every failure surfaced by the SDK is one of these variants, so callers can
/// match broadly (`Err(e)`) or narrowly (`Err(Error::RateLimit { .. })`).
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid, expired or revoked credential (401), or a credential lacking scope (403).
    /// Never retried.
    #[error("{}", format_remote(Some(*status), "Authentication failed", message))]
    Authentication { status: u16, message: String },

    /// Rate limit still in effect after the retry budget was spent.
    #[error("{}{}", format_remote(Some(*status), "Rate limit exceeded", message), format_retry_after(*retry_after))]
    RateLimit {
        status: u16,
        message: String,
        /// Last `Retry-After` value observed, in seconds.
        retry_after: Option<u64>,
    },

    /// Malformed request or unparsable/out-of-contract response. Never retried.
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    /// Referenced entity is absent (404). Never retried.
    #[error("{}", format_remote(Some(*status), "Resource not found", message))]
    NotFound { status: u16, message: String },

    /// Backend-side failure (5xx) that persisted through the retry budget.
    #[error("{}", format_remote(Some(*status), "Server error", message))]
    Server { status: u16, message: String },

    /// Any other non-success HTTP status.
    #[error("{}", format_remote(Some(*status), &format!("HTTP {}", status), message))]
    Api { status: u16, message: String },

    /// Network-level failure (connection refused, timeout) that persisted through the retry budget.
    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Local write failure while exporting a conversation.
    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Client is closed")]
    ClientClosed,

    #[error("Operation cancelled")]
    Cancelled,
}

fn format_remote(status: Option<u16>, title: &str, detail: &str) -> String {
    let base = match status {
        Some(s) => format!("[{}] {}", s, title),
        None => title.to_string(),
    };
    if detail.is_empty() {
        base
    } else {
        format!("{} – {}", base, detail)
    }
}

fn format_retry_after(retry_after: Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {}s)", secs),
        None => String::new(),
    }
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if let Some(status) = ctx.status_code {
        parts.push(format!("status: {}", status));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// HTTP status code carried by the error, if it came from a server response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. }
            | Error::RateLimit { status, .. }
            | Error::NotFound { status, .. }
            | Error::Server { status, .. }
            | Error::Api { status, .. } => Some(*status),
            Error::Validation { context, .. } => context.status_code,
            _ => None,
        }
    }

    /// How long the server asked us to wait, for rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimit {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Whether the condition is transient. The client already retried these
    /// up to its bound before surfacing them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit { .. } | Error::Server { .. } | Error::Transport(_)
        )
    }

    /// 403: the credential is valid but lacks the required scope.
    pub fn is_insufficient_scope(&self) -> bool {
        matches!(self, Error::Authentication { status: 403, .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_render_status_and_detail() {
        let err = Error::Server {
            status: 500,
            message: "Internal".into(),
        };
        let s = err.to_string();
        assert!(s.contains("[500]"));
        assert!(s.contains("Internal"));
    }

    #[test]
    fn rate_limit_exposes_retry_after() {
        let err = Error::RateLimit {
            status: 429,
            message: "Too fast".into(),
            retry_after: Some(30),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(err.status_code(), Some(429));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("retry after 30s"));
    }

    #[test]
    fn auth_errors_are_not_retryable() {
        let err = Error::Authentication {
            status: 403,
            message: String::new(),
        };
        assert!(!err.is_retryable());
        assert!(err.is_insufficient_scope());
        assert_eq!(err.to_string(), "[403] Authentication failed");
    }

    #[test]
    fn validation_context_is_rendered() {
        let err = Error::validation_with_context(
            "confidence out of range",
            ErrorContext::new()
                .with_field_path("confidence")
                .with_details("1.5"),
        );
        let s = err.to_string();
        assert!(s.contains("field: confidence"));
        assert!(s.contains("details: 1.5"));
        assert_eq!(err.context().and_then(|c| c.field_path.as_deref()), Some("confidence"));
    }
}
