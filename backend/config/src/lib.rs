//! `livetalk-config`: runtime configuration for the LiveTalk server.
//!
//! Provides:
//! - Typed config schema with per-section defaults
//! - YAML loading (missing file means defaults)
//! - `${ENV_VAR}` substitution and `LIVETALK_*` overrides
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use env::{
    apply_env_overrides, apply_env_overrides_with, resolve_env_vars, resolve_env_vars_with,
    MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config, load_raw};
pub use schema::{
    AudioConfig, ChatConfig, LiveTalkConfig, LoggingConfig, ModelConfig, ServerConfig,
    SessionConfig, TransportConfig, TtsConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Load, substitute env vars, apply overrides and validate a config file.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<LiveTalkConfig> {
    let raw = load_raw(path).await?;
    prepare(raw, &std::env::vars().collect())
}

/// The load pipeline after the file has been read.
pub fn prepare(raw: serde_json::Value, env: &HashMap<String, String>) -> Result<LiveTalkConfig> {
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;
    let config: LiveTalkConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let config = apply_env_overrides_with(config, env)?;
    ensure_valid(&config)?;
    Ok(config)
}

/// Log warnings and fail on the first validation error.
pub fn ensure_valid(config: &LiveTalkConfig) -> Result<()> {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }
    Ok(())
}
