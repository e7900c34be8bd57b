//! HTTP status → error taxonomy.

use crate::decode::error_detail;
use crate::{Error, ErrorContext};

/// Map a non-success response to the error the caller sees.
///
/// `retry_after` is the parsed `Retry-After` header, in seconds.
pub(crate) fn classify(status: u16, body: &[u8], retry_after: Option<u64>) -> Error {
    let message = error_detail(body);
    match status {
        401 | 403 => Error::Authentication { status, message },
        404 => Error::NotFound { status, message },
        400 | 422 => Error::validation_with_context(
            message,
            ErrorContext::new()
                .with_status_code(status)
                .with_source("server"),
        ),
        429 => Error::RateLimit {
            status,
            message,
            retry_after,
        },
        500..=599 => Error::Server { status, message },
        _ => Error::Api { status, message },
    }
}

/// Short class label for logs.
pub(crate) fn error_class(status: u16) -> &'static str {
    match status {
        401 => "authentication",
        403 => "permission_denied",
        404 => "not_found",
        400 | 422 => "invalid_request",
        429 => "rate_limited",
        500..=599 => "server_error",
        _ => "http_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert!(matches!(classify(401, b"", None), Error::Authentication { status: 401, .. }));
        assert!(classify(403, b"", None).is_insufficient_scope());
        assert!(matches!(classify(404, b"", None), Error::NotFound { .. }));
        assert!(matches!(classify(422, b"", None), Error::Validation { .. }));
        assert!(matches!(classify(400, b"", None), Error::Validation { .. }));
        assert!(matches!(classify(502, b"", None), Error::Server { status: 502, .. }));
        assert!(matches!(classify(409, b"", None), Error::Api { status: 409, .. }));
    }

    #[test]
    fn test_rate_limit_keeps_retry_after_and_detail() {
        let err = classify(429, br#"{"detail":"Slow down"}"#, Some(7));
        match err {
            Error::RateLimit {
                retry_after,
                message,
                ..
            } => {
                assert_eq!(retry_after, Some(7));
                assert_eq!(message, "Slow down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validation_from_server_carries_status() {
        assert_eq!(classify(422, b"bad", None).status_code(), Some(422));
    }
}
