//! Client configuration and source precedence.
//!
//! Values can come from explicit arguments, environment variables, or the
//! local config file (`~/.ttkia/config.json`). [`resolve`] merges those layers
//! once, first layer wins; the client only ever sees the resolved
//! [`ClientConfig`] and never reads the environment afterwards.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, ErrorContext, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_URL: &str = "TTKIA_URL";
pub const ENV_BASE_URL: &str = "TTKIA_BASE_URL";
pub const ENV_API_KEY: &str = "TTKIA_API_KEY";
pub const ENV_TOKEN: &str = "TTKIA_TOKEN";
pub const ENV_TIMEOUT: &str = "TTKIA_TIMEOUT";
pub const ENV_VERIFY_SSL: &str = "TTKIA_VERIFY_SSL";
pub const ENV_PROXY_URL: &str = "TTKIA_PROXY_URL";

/// Fully resolved connection settings.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
    pub verify_tls: bool,
    /// HTTP(S) proxy for every request.
    pub proxy: Option<String>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// One configuration source. Every field is optional; unset fields fall
/// through to the next layer.
#[derive(Clone, Default, Deserialize)]
pub struct ConfigLayer {
    #[serde(default, alias = "base_url")]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, alias = "bearer_token")]
    pub token: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default, alias = "verify_tls")]
    pub verify_ssl: Option<bool>,
    #[serde(default, alias = "proxy_url")]
    pub proxy: Option<String>,
}

impl ConfigLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = Some(verify);
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a layer from `(name, value)` pairs. Unparsable numeric or boolean
    /// values are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut layer = Self::default();
        let mut base_url_alias = None;
        for (k, v) in vars {
            let v: String = v.into();
            if v.trim().is_empty() {
                continue;
            }
            match k.as_ref() {
                ENV_URL => layer.url = Some(v),
                ENV_BASE_URL => base_url_alias = Some(v),
                ENV_API_KEY => layer.api_key = Some(v),
                ENV_TOKEN => layer.token = Some(v),
                ENV_TIMEOUT => layer.timeout = v.trim().parse::<f64>().ok(),
                ENV_VERIFY_SSL => layer.verify_ssl = parse_bool(&v),
                ENV_PROXY_URL => layer.proxy = Some(v),
                _ => {}
            }
        }
        if layer.url.is_none() {
            layer.url = base_url_alias;
        }
        layer
    }

    /// Read a JSON config file. A missing file is an empty layer.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(Error::configuration_with_context(
                    format!("Cannot read config file: {}", e),
                    ErrorContext::new()
                        .with_details(path.display().to_string())
                        .with_source("config_file"),
                ))
            }
        };
        serde_json::from_str(&raw).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_file"),
            )
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `$HOME/.ttkia/config.json`, when a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".ttkia").join("config.json"))
}

/// Merge layers in precedence order (first wins) into a [`ClientConfig`].
///
/// Only the base URL is required here; credential presence is checked when
/// the client is built.
pub fn resolve(layers: &[ConfigLayer]) -> Result<ClientConfig> {
    fn first<T: Clone>(layers: &[ConfigLayer], pick: impl Fn(&ConfigLayer) -> Option<T>) -> Option<T> {
        layers.iter().find_map(pick)
    }

    let base_url = first(layers, |l| l.url.clone()).ok_or_else(|| {
        Error::configuration_with_context(
            "No TTKIA URL configured",
            ErrorContext::new()
                .with_field_path("url")
                .with_details(format!("set {} or add \"url\" to the config file", ENV_URL))
                .with_source("config_resolve"),
        )
    })?;

    let timeout = match first(layers, |l| l.timeout) {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "Timeout must be a positive number of seconds",
                    ErrorContext::new()
                        .with_field_path("timeout")
                        .with_details(secs.to_string())
                        .with_source("config_resolve"),
                )
            })?,
        None => DEFAULT_TIMEOUT,
    };

    Ok(ClientConfig {
        base_url,
        api_key: first(layers, |l| l.api_key.clone()),
        bearer_token: first(layers, |l| l.token.clone()),
        timeout,
        verify_tls: first(layers, |l| l.verify_ssl).unwrap_or(true),
        proxy: first(layers, |l| l.proxy.clone()),
    })
}
