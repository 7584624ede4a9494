//! Environment handling for config values.
//!
//! Two passes run at load time:
//! - `${VAR_NAME}` substitution in string leaves (uppercase names only,
//!   `$${VAR}` escapes to a literal `${VAR}`)
//! - `LIVETALK_*` overrides applied to the typed config

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::schema::LiveTalkConfig;

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var regex"));

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references across a config value tree using the
/// process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using the given variable map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => {
            let items = arr
                .iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(items))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                out.insert(k.clone(), substitute_value(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let out = ENV_VAR_PATTERN.replace_all(s, |caps: &regex::Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                if missing.is_none() {
                    missing = Some(MissingEnvVarError {
                        var_name: name.to_string(),
                        config_path: path.to_string(),
                    });
                }
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(out.into_owned())
}

pub const ENV_MODEL: &str = "LIVETALK_MODEL";
pub const ENV_MAX_SESSION: &str = "LIVETALK_MAX_SESSION";
pub const ENV_LISTEN_PORT: &str = "LIVETALK_LISTEN_PORT";
pub const ENV_AVATAR_ID: &str = "LIVETALK_AVATAR_ID";
pub const ENV_TTS_SERVER: &str = "LIVETALK_TTS_SERVER";

/// Apply `LIVETALK_*` overrides from the process environment.
pub fn apply_env_overrides(config: LiveTalkConfig) -> Result<LiveTalkConfig> {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply `LIVETALK_*` overrides from the given variable map.
pub fn apply_env_overrides_with(
    mut config: LiveTalkConfig,
    env: &HashMap<String, String>,
) -> Result<LiveTalkConfig> {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(model) = get(ENV_MODEL) {
        debug!(value = model, "{ENV_MODEL} override");
        config.model.kind = model.to_string();
    }
    if let Some(max) = get(ENV_MAX_SESSION) {
        config.session.max_sessions = max
            .parse()
            .with_context(|| format!("{ENV_MAX_SESSION} must be a positive integer, got '{max}'"))?;
    }
    if let Some(port) = get(ENV_LISTEN_PORT) {
        config.server.listen_port = port
            .parse()
            .with_context(|| format!("{ENV_LISTEN_PORT} must be a port number, got '{port}'"))?;
    }
    if let Some(avatar) = get(ENV_AVATAR_ID) {
        config.model.avatar_id = avatar.to_string();
    }
    if let Some(server) = get(ENV_TTS_SERVER) {
        config.tts.server = server.to_string();
    }
    Ok(config)
}
