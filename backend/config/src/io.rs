//! Config file loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::schema::LiveTalkConfig;

const CONFIG_FILE_NAME: &str = "livetalk.yaml";

/// Resolve the config directory.
/// Priority: `LIVETALK_CONFIG_DIR` env > `~/.livetalk/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LIVETALK_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".livetalk"))
        .unwrap_or_else(|| PathBuf::from(".livetalk"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the raw YAML tree. A missing file yields an empty mapping so every
/// section falls back to its defaults.
pub async fn load_raw(path: &Path) -> Result<serde_json::Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(serde_json::Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    // Empty file parses to null.
    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(if value.is_null() { serde_json::Value::Object(Default::default()) } else { value })
}

/// Load and parse the config without env substitution or validation.
pub async fn load_config(path: &Path) -> Result<LiveTalkConfig> {
    let value = load_raw(path).await?;
    serde_json::from_value(value)
        .with_context(|| format!("Invalid config structure in: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.yaml")).await.unwrap();
        assert_eq!(cfg, LiveTalkConfig::default());
    }

    #[tokio::test]
    async fn empty_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livetalk.yaml");
        std::fs::write(&path, "").unwrap();
        let cfg = load_config(&path).await.unwrap();
        assert_eq!(cfg, LiveTalkConfig::default());
    }

    #[tokio::test]
    async fn reads_yaml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livetalk.yaml");
        std::fs::write(
            &path,
            "server:\n  listenPort: 9001\nmodel:\n  kind: ultralight\n  fps: 25\n",
        )
        .unwrap();
        let cfg = load_config(&path).await.unwrap();
        assert_eq!(cfg.server.listen_port, 9001);
        assert_eq!(cfg.model.kind, "ultralight");
        assert_eq!(cfg.model.fps, 25);
    }

    #[tokio::test]
    async fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livetalk.yaml");
        std::fs::write(&path, "server: [unclosed").unwrap();
        assert!(load_config(&path).await.is_err());
    }
}
