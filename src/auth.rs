//! Credential selection.
//!
//! The service accepts two auth headers: `X-API-Key` (API keys, prefixed
//! `ttkia_sk_`) and `Authorization: Bearer` (app tokens / JWTs). The choice is
//! made once, when the client is built; every request then carries exactly one
//! of them.

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, ErrorContext, Result};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_PREFIX: &str = "ttkia_sk_";

/// The credential presented on every request.
#[derive(Clone)]
pub enum Credential {
    ApiKey(SecretString),
    BearerToken(SecretString),
}

impl Credential {
    /// Pick the credential to use. API key wins when both are configured.
    ///
    /// Fails when neither is present, when the chosen value is blank, or when
    /// an API key lacks the `ttkia_sk_` prefix.
    pub fn resolve(api_key: Option<String>, bearer_token: Option<String>) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let bearer_token = bearer_token.filter(|t| !t.trim().is_empty());

        match (api_key, bearer_token) {
            (Some(key), _) => {
                if !key.starts_with(API_KEY_PREFIX) {
                    return Err(Error::configuration_with_context(
                        format!("API key must start with '{}'", API_KEY_PREFIX),
                        ErrorContext::new()
                            .with_field_path("api_key")
                            .with_source("auth_resolver"),
                    ));
                }
                Ok(Credential::ApiKey(SecretString::new(key)))
            }
            (None, Some(token)) => Ok(Credential::BearerToken(SecretString::new(token))),
            (None, None) => Err(Error::configuration_with_context(
                "Provide either api_key or bearer_token",
                ErrorContext::new().with_source("auth_resolver"),
            )),
        }
    }

    /// Short label for logs and `Debug` output. Never the secret itself.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ApiKey(_) => "api_key",
            Credential::BearerToken(_) => "bearer",
        }
    }

    /// The single auth header for an outgoing request.
    pub fn header(&self) -> Result<(HeaderName, HeaderValue)> {
        let (name, raw) = match self {
            Credential::ApiKey(key) => (
                HeaderName::from_static(API_KEY_HEADER),
                key.expose_secret().to_string(),
            ),
            Credential::BearerToken(token) => {
                (AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            }
        };
        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            Error::configuration_with_context(
                "Credential contains characters not allowed in an HTTP header",
                ErrorContext::new()
                    .with_field_path(self.kind())
                    .with_source("auth_resolver"),
            )
        })?;
        value.set_sensitive(true);
        Ok((name, value))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential::{}([REDACTED])", self.kind())
    }
}
