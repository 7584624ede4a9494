//! LiveTalk runtime configuration schema.
//!
//! Typed for serde YAML/JSON with camelCase keys. Every section has a
//! `Default` so a partial file (or no file) yields a runnable config.

use serde::{Deserialize, Serialize};

use crate::defaults;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveTalkConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub session: SessionConfig,
    pub tts: TtsConfig,
    pub chat: ChatConfig,
    pub transport: TransportConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::DEFAULT_BIND.to_string(),
            listen_port: defaults::DEFAULT_LISTEN_PORT,
        }
    }
}

// ---------------------------------------------------------------------------
// Model / avatar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    /// "wav2lip" | "musetalk" | "ultralight"
    pub kind: String,
    pub avatar_id: String,
    /// Directory holding one sub-directory per avatar
    pub avatar_root: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: defaults::DEFAULT_MODEL.to_string(),
            avatar_id: defaults::DEFAULT_AVATAR_ID.to_string(),
            avatar_root: defaults::DEFAULT_AVATAR_ROOT.to_string(),
            fps: defaults::DEFAULT_FPS,
            width: defaults::DEFAULT_FRAME_SIZE,
            height: defaults::DEFAULT_FRAME_SIZE,
            batch_size: defaults::DEFAULT_BATCH_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub max_sessions: usize,
    /// Renderer construction worker slots
    pub build_workers: usize,
    /// Concurrent chat responder calls
    pub responder_workers: usize,
    pub id_digits: u32,
    pub id_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: defaults::DEFAULT_MAX_SESSIONS,
            build_workers: defaults::DEFAULT_BUILD_WORKERS,
            responder_workers: defaults::DEFAULT_RESPONDER_WORKERS,
            id_digits: defaults::DEFAULT_ID_DIGITS,
            id_retries: defaults::DEFAULT_ID_RETRIES,
        }
    }
}

// ---------------------------------------------------------------------------
// TTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TtsConfig {
    /// "indextts" | "silent"
    pub engine: String,
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    /// Reference voice sample uploaded with each request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_text: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            engine: defaults::DEFAULT_TTS_ENGINE.to_string(),
            server: defaults::DEFAULT_TTS_SERVER.to_string(),
            voice_id: None,
            ref_file: None,
            ref_text: None,
            timeout_secs: defaults::DEFAULT_TTS_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Chat responder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// "echo" | "openai"
    pub responder: String,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Prefix the echo responder puts in front of the message
    pub reply_prefix: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            responder: defaults::DEFAULT_RESPONDER.to_string(),
            base_url: defaults::DEFAULT_CHAT_BASE_URL.to_string(),
            model: defaults::DEFAULT_CHAT_MODEL.to_string(),
            api_key: None,
            system_prompt: None,
            reply_prefix: defaults::DEFAULT_REPLY_PREFIX.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
    /// Video codec families in preference order (mime types)
    pub video_codec_priority: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: defaults::DEFAULT_ICE_SERVERS.iter().map(|s| s.to_string()).collect(),
            video_codec_priority: defaults::DEFAULT_VIDEO_CODEC_PRIORITY
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Audio uploads / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioConfig {
    pub upload_dir: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { upload_dir: defaults::DEFAULT_UPLOAD_DIR.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling NDJSON logs; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: defaults::DEFAULT_LOG_LEVEL.to_string(), dir: None }
    }
}
