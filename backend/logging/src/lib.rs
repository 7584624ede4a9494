//! Structured logging for LiveTalk.
//!
//! Handles subscriber setup (console plus rolling NDJSON file), session
//! lifecycle events and redaction of free text before it is logged.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{SessionEvent, SessionEventEntry, SessionEventLogger, SESSION_EVENTS_TARGET};
pub use logger::{init_logger, LOG_FILE_PREFIX};
pub use redact::redact_sensitive_data;
