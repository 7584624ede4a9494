use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LiveTalkError;

/// Numeric session identifier handed to clients as `sessionid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The renderer model family a server instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// wav2lip-style lip sync
    #[serde(rename = "wav2lip", alias = "lipsync")]
    LipSync,
    #[serde(rename = "musetalk")]
    MuseTalk,
    #[serde(rename = "ultralight")]
    UltraLight,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::LipSync, ModelKind::MuseTalk, ModelKind::UltraLight];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LipSync => "wav2lip",
            Self::MuseTalk => "musetalk",
            Self::UltraLight => "ultralight",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = LiveTalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav2lip" | "lipsync" => Ok(Self::LipSync),
            "musetalk" => Ok(Self::MuseTalk),
            "ultralight" => Ok(Self::UltraLight),
            _ => Err(LiveTalkError::UnknownModelKind(s.to_string())),
        }
    }
}

/// Lifecycle state of a registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Admitted, renderer not yet attached
    Pending,
    Negotiating,
    Connected,
    /// Teardown started; the entry is about to be purged
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Negotiating => "negotiating",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Presentation state code forwarded from the playback-state endpoint.
///
/// `0` is the idle loop; other codes select custom idle/talking clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybackState(pub i32);

impl PlaybackState {
    pub const IDLE: PlaybackState = PlaybackState(0);

    pub fn is_idle(self) -> bool {
        self.0 == 0
    }
}

/// SDP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Pranswer => "pranswer",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SdpType {
    type Err = LiveTalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            "pranswer" => Ok(Self::Pranswer),
            "rollback" => Ok(Self::Rollback),
            other => Err(LiveTalkError::Negotiation(format!("unsupported sdp type '{other}'"))),
        }
    }
}

/// A connection description exchanged during signaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: SdpType,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into(), kind: SdpType::Offer }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into(), kind: SdpType::Answer }
    }
}
