//! Default values for every config field.

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 8010;

pub const DEFAULT_MODEL: &str = "musetalk";
pub const DEFAULT_AVATAR_ID: &str = "avator_1";
pub const DEFAULT_AVATAR_ROOT: &str = "data/avatars";
pub const DEFAULT_FPS: u32 = 50;
pub const DEFAULT_FRAME_SIZE: u32 = 450;
pub const DEFAULT_BATCH_SIZE: u32 = 16;

/// One concurrent session unless configured otherwise.
pub const DEFAULT_MAX_SESSIONS: usize = 1;
pub const DEFAULT_BUILD_WORKERS: usize = 2;
pub const DEFAULT_RESPONDER_WORKERS: usize = 4;
pub const DEFAULT_ID_DIGITS: u32 = 6;
pub const DEFAULT_ID_RETRIES: u32 = 8;

pub const DEFAULT_TTS_ENGINE: &str = "indextts";
pub const DEFAULT_TTS_SERVER: &str = "http://localhost:17860";
pub const DEFAULT_TTS_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_RESPONDER: &str = "echo";
pub const DEFAULT_CHAT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "qwen2.5";
pub const DEFAULT_REPLY_PREFIX: &str = "收到: ";

pub const DEFAULT_ICE_SERVERS: [&str; 2] = ["stun:stun.l.google.com:19302", "stun:stun.miwifi.com:3478"];
pub const DEFAULT_VIDEO_CODEC_PRIORITY: [&str; 3] = ["video/H264", "video/VP8", "video/rtx"];

pub const DEFAULT_UPLOAD_DIR: &str = "/tmp/audio";
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const TTS_ENGINES: [&str; 2] = ["indextts", "silent"];
pub const RESPONDERS: [&str; 2] = ["echo", "openai"];
