//! Provider configuration
//!
//! Providers are described by a JSON array, one object per NNTP server.
//! Field names on the wire are PascalCase; optional fields default to
//! zero/false so a minimal entry only needs `Name`, `Host` and `Port`.

use crate::error::{RefreshError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Default provider config path when `--provider` is not given
pub const DEFAULT_PROVIDER_PATH: &str = "./provider.json";

/// Configuration for one NNTP provider
///
/// # Example
///
/// ```
/// let json = r#"[{
///     "Name": "main",
///     "Host": "news.example.com",
///     "Port": 563,
///     "SSL": true,
///     "Username": "user",
///     "Password": "pass",
///     "MaxConns": 20,
///     "ConnWaitTime": 10
/// }]"#;
/// let providers = nzb_refresh::parse_provider_list(json).unwrap();
/// assert_eq!(providers[0].name, "main");
/// assert_eq!(providers[0].max_conns, 20);
/// assert!(!providers[0].skip_ssl_check);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name, used in statistics and logs
    #[serde(rename = "Name")]
    pub name: String,

    /// Server hostname
    #[serde(rename = "Host")]
    pub host: String,

    /// Server port (typically 119 for plain, 563 for TLS)
    #[serde(rename = "Port")]
    pub port: u16,

    /// Use TLS for this provider
    #[serde(rename = "SSL", default)]
    pub ssl: bool,

    /// Accept invalid TLS certificates (self-signed, expired, wrong host)
    #[serde(rename = "SkipSslCheck", default)]
    pub skip_ssl_check: bool,

    /// Username for AUTHINFO; empty disables authentication
    #[serde(rename = "Username", default)]
    pub username: String,

    /// Password for AUTHINFO
    #[serde(rename = "Password", default)]
    pub password: String,

    /// Maximum pooled connections for this provider
    #[serde(rename = "MaxConns", default)]
    pub max_conns: u32,

    /// Seconds to wait for a pooled connection before giving up
    #[serde(rename = "ConnWaitTime", default)]
    pub conn_wait_time: u64,

    /// Seconds an idle pooled connection is kept before being reaped
    #[serde(rename = "IdleTimeout", default)]
    pub idle_timeout: u64,

    /// Verify pooled connections with a DATE probe before reuse
    #[serde(rename = "HealthCheck", default)]
    pub health_check: bool,

    /// Accepted for config compatibility; connection caps make a 502 burst
    /// budget unreachable with this pool
    #[serde(rename = "MaxTooManyConnsErrors", default)]
    pub max_too_many_conns_errors: u32,

    /// Connection error budget, used as the acquire retry limit
    #[serde(rename = "MaxConnErrors", default)]
    pub max_conn_errors: u32,
}

impl ProviderConfig {
    /// Effective pool size; a missing or zero `MaxConns` still gets one
    /// connection so the provider participates in the check.
    pub fn effective_max_conns(&self) -> u32 {
        self.max_conns.max(1)
    }
}

/// Parse a provider list from JSON
///
/// # Errors
///
/// Returns [`RefreshError::Config`] if the JSON is malformed, the list is
/// empty, or two providers share a name.
pub fn parse_provider_list(json: &str) -> Result<Vec<ProviderConfig>> {
    let providers: Vec<ProviderConfig> = serde_json::from_str(json)
        .map_err(|e| RefreshError::Config(format!("invalid provider list: {}", e)))?;

    if providers.is_empty() {
        return Err(RefreshError::Config(
            "provider list is empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for provider in &providers {
        if provider.name.is_empty() {
            return Err(RefreshError::Config(
                "provider with empty name".to_string(),
            ));
        }
        if !seen.insert(provider.name.clone()) {
            return Err(RefreshError::Config(format!(
                "duplicate provider name '{}'",
                provider.name
            )));
        }
    }

    Ok(providers)
}

/// Load and parse a provider list from a file
pub fn load_provider_list(path: &Path) -> Result<Vec<ProviderConfig>> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        RefreshError::Config(format!(
            "unable to read provider list '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_provider_list(&json)
}
