use thiserror::Error;

use crate::types::SessionId;

/// Top-level error type for the LiveTalk session server.
#[derive(Debug, Error)]
pub enum LiveTalkError {
    /// Admission refused because the concurrent session cap is reached.
    #[error("reach max session")]
    AdmissionRejected,

    #[error("unknown model kind: {0}")]
    UnknownModelKind(String),

    #[error("renderer build failed for session {session_id}: {reason}")]
    RendererBuildFailure { session_id: SessionId, reason: String },

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session was torn down while its setup was still in flight.
    #[error("session {0} closed before setup completed")]
    SessionClosed(SessionId),

    #[error("no free session id after {attempts} attempts")]
    SessionCollision { attempts: u32 },

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("codec preference not applied: {0}")]
    CodecPreferenceFailure(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = LiveTalkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_message_matches_wire_contract() {
        assert_eq!(LiveTalkError::AdmissionRejected.to_string(), "reach max session");
    }

    #[test]
    fn build_failure_names_session() {
        let err = LiveTalkError::RendererBuildFailure {
            session_id: SessionId(123456),
            reason: "avatar has no frames".into(),
        };
        assert!(err.to_string().contains("123456"));
    }
}
