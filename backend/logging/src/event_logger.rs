//! Session lifecycle events written through `tracing` on a dedicated target,
//! so the NDJSON file layer can be filtered for them.

use chrono::{DateTime, Utc};
use livetalk_core::{SessionId, SessionState};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

pub const SESSION_EVENTS_TARGET: &str = "session_events";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Admitted { active: usize, max: usize },
    Rejected { active: usize, max: usize },
    RendererAttached { model: String },
    /// Construction finished after the session was torn down.
    RendererDiscarded { model: String },
    StateChanged { from: SessionState, to: SessionState },
    Command { kind: String, text: Option<String> },
    CleanedUp { reason: String },
}

#[derive(Debug, Serialize)]
pub struct SessionEventEntry {
    pub session_id: Option<SessionId>,
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}

pub struct SessionEventLogger;

impl SessionEventLogger {
    /// Log an event for `session_id`. Rejections happen before an id exists.
    pub fn log(session_id: Option<SessionId>, event: SessionEvent) {
        let entry = Self::entry(session_id, event);
        info!(target: SESSION_EVENTS_TARGET, event = ?entry, "session event");
    }

    fn entry(session_id: Option<SessionId>, mut event: SessionEvent) -> SessionEventEntry {
        if let SessionEvent::Command { text: Some(text), .. } = &mut event {
            *text = redact_sensitive_data(text);
        }
        SessionEventEntry { session_id, timestamp: Utc::now(), event }
    }
}
