//! JSON bodies of the HTTP API.

use livetalk_core::{PlaybackState, SdpType, SessionId};
use livetalk_session::SessionSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: SdpType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OfferResponse {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sessionid: SessionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanKind {
    Echo,
    Chat,
}

#[derive(Debug, Deserialize)]
pub struct HumanRequest {
    pub sessionid: SessionId,
    #[serde(rename = "type")]
    pub kind: HumanKind,
    pub text: String,
    #[serde(default)]
    pub interrupt: bool,
}

#[derive(Debug, Deserialize)]
pub struct InterruptRequest {
    pub sessionid: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct AudioTypeRequest {
    pub sessionid: SessionId,
    pub audiotype: PlaybackState,
}

/// `{code, msg}` reply of every command endpoint; `code` is 0 or -1.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResult {
    pub code: i32,
    pub msg: String,
}

impl ApiResult {
    pub fn ok() -> Self {
        Self { code: 0, msg: "ok".into() }
    }

    pub fn error(msg: impl ToString) -> Self {
        Self { code: -1, msg: msg.to_string() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub sessions: usize,
    pub model: String,
    /// One entry per registered session, ordered by id.
    #[serde(default)]
    pub active: Vec<SessionSummary>,
}
