// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and validation for the Taskforge orchestrator.
//!
//! [`OrchestratorConfig`] holds the four runtime-tunable values the
//! orchestrator recognizes. It is loaded once at boot, before any [`tf_provider::RequestContext`]
//! exists, so [`ConfigError`] is a thin newtype rather than a dependency
//! on `tf-error`'s richer, request-scoped error taxonomy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// The four configuration values the orchestrator reads at boot.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How long, in minutes, a pending API-key claim token remains claimable.
    #[serde(default = "default_claim_url_expiration_minutes")]
    pub claim_url_expiration_minutes: i64,

    /// `ListExecutions` limit used when a caller passes `0`.
    #[serde(default = "default_execution_list_limit")]
    pub default_execution_list_limit: usize,

    /// Entropy, in bytes, drawn for every minted secret token (api keys,
    /// claim tokens). Must be at least [`tf_ids::MIN_SECRET_TOKEN_BYTES`].
    #[serde(default = "default_secret_token_byte_size")]
    pub secret_token_byte_size: usize,

    /// Streaming-credential lifetime, in seconds.
    #[serde(default = "default_websocket_token_ttl")]
    pub websocket_token_ttl: i64,
}

fn default_claim_url_expiration_minutes() -> i64 {
    24 * 60
}

fn default_execution_list_limit() -> usize {
    100
}

fn default_secret_token_byte_size() -> usize {
    tf_ids::MIN_SECRET_TOKEN_BYTES
}

fn default_websocket_token_ttl() -> i64 {
    24 * 60 * 60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            claim_url_expiration_minutes: default_claim_url_expiration_minutes(),
            default_execution_list_limit: default_execution_list_limit(),
            secret_token_byte_size: default_secret_token_byte_size(),
            websocket_token_ttl: default_websocket_token_ttl(),
        }
    }
}

/// Load an [`OrchestratorConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`OrchestratorConfig::default`].
///
/// Environment variable overrides are applied on top in both cases, and
/// the result is validated before being returned.
///
/// # Errors
///
/// [`ConfigError::FileNotFound`] if `path` is given but unreadable,
/// [`ConfigError::ParseError`] for malformed TOML, [`ConfigError::ValidationError`]
/// if the resolved values fail [`validate_config`].
pub fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => OrchestratorConfig::default(),
    };
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Parse a TOML string into an [`OrchestratorConfig`].
///
/// # Errors
///
/// [`ConfigError::ParseError`] for malformed TOML.
pub fn parse_toml(content: &str) -> Result<OrchestratorConfig, ConfigError> {
    toml::from_str::<OrchestratorConfig>(content)
        .map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

/// Apply environment variable overrides, reading through `lookup` rather
/// than `std::env` directly so tests can supply a fixed set of variables
/// without mutating real process environment (mutating it is both racy
/// across parallel test threads and, since Rust 2024, `unsafe`).
///
/// Recognised variables:
/// - `TF_CLAIM_URL_EXPIRATION_MINUTES`
/// - `TF_DEFAULT_EXECUTION_LIST_LIMIT`
/// - `TF_SECRET_TOKEN_BYTE_SIZE`
/// - `TF_WEBSOCKET_TOKEN_TTL`
///
/// A var present but unparseable as the target field's type is ignored
/// rather than erroring: validation catches the resulting default or
/// stale value instead of failing boot on a malformed override.
pub fn apply_env_overrides_with(config: &mut OrchestratorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("TF_CLAIM_URL_EXPIRATION_MINUTES")
        && let Ok(parsed) = val.parse()
    {
        config.claim_url_expiration_minutes = parsed;
    }
    if let Some(val) = lookup("TF_DEFAULT_EXECUTION_LIST_LIMIT")
        && let Ok(parsed) = val.parse()
    {
        config.default_execution_list_limit = parsed;
    }
    if let Some(val) = lookup("TF_SECRET_TOKEN_BYTE_SIZE")
        && let Ok(parsed) = val.parse()
    {
        config.secret_token_byte_size = parsed;
    }
    if let Some(val) = lookup("TF_WEBSOCKET_TOKEN_TTL")
        && let Ok(parsed) = val.parse()
    {
        config.websocket_token_ttl = parsed;
    }
}

/// Apply environment variable overrides from the real process environment.
/// See [`apply_env_overrides_with`] for the recognised variable names.
pub fn apply_env_overrides(config: &mut OrchestratorConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

/// Validate a resolved configuration.
///
/// # Errors
///
/// [`ConfigError::ValidationError`] if any duration is zero or negative,
/// if `default_execution_list_limit` is zero, or if `secret_token_byte_size`
/// is below [`tf_ids::MIN_SECRET_TOKEN_BYTES`].
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.claim_url_expiration_minutes <= 0 {
        errors.push(format!(
            "claim_url_expiration_minutes must be positive, got {}",
            config.claim_url_expiration_minutes
        ));
    }
    if config.default_execution_list_limit == 0 {
        errors.push("default_execution_list_limit must be positive".to_string());
    }
    if config.secret_token_byte_size < tf_ids::MIN_SECRET_TOKEN_BYTES {
        errors.push(format!(
            "secret_token_byte_size must be at least {}, got {}",
            tf_ids::MIN_SECRET_TOKEN_BYTES,
            config.secret_token_byte_size
        ));
    }
    if config.websocket_token_ttl <= 0 {
        errors.push(format!(
            "websocket_token_ttl must be positive, got {}",
            config.websocket_token_ttl
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}
