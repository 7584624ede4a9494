//! Config validation with user-friendly error messages.

use livetalk_core::ModelKind;
use thiserror::Error;

use crate::defaults::{RESPONDERS, TTS_ENGINES};
use crate::schema::LiveTalkConfig;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError { path: path.into(), message: message.into() });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError { path: path.into(), message: message.into() });
    }
}

pub fn validate(config: &LiveTalkConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_model(config, &mut report);
    validate_session(config, &mut report);
    validate_services(config, &mut report);
    validate_transport(config, &mut report);
    report
}

fn validate_model(config: &LiveTalkConfig, report: &mut ValidationReport) {
    let model = &config.model;
    if let Err(e) = model.kind.parse::<ModelKind>() {
        report.error("model.kind", e.to_string());
    }
    if model.avatar_id.trim().is_empty() {
        report.error("model.avatarId", "Avatar id cannot be empty");
    }
    if !(1..=120).contains(&model.fps) {
        report.error("model.fps", format!("fps must be in 1..=120, got {}", model.fps));
    }
    if model.width == 0 || model.height == 0 {
        report.error("model", "width and height must be > 0");
    }
    if model.batch_size == 0 {
        report.error("model.batchSize", "batchSize must be > 0");
    }
}

fn validate_session(config: &LiveTalkConfig, report: &mut ValidationReport) {
    let session = &config.session;
    if session.max_sessions == 0 {
        report.error("session.maxSessions", "maxSessions must be >= 1");
    }
    if session.build_workers == 0 {
        report.error("session.buildWorkers", "buildWorkers must be >= 1");
    }
    if session.responder_workers == 0 {
        report.error("session.responderWorkers", "responderWorkers must be >= 1");
    }
    if !(4..=9).contains(&session.id_digits) {
        report.error(
            "session.idDigits",
            format!("idDigits must be in 4..=9, got {}", session.id_digits),
        );
    } else {
        let id_space = 9 * 10u64.pow(session.id_digits - 1);
        if id_space < session.max_sessions as u64 {
            report.error(
                "session.idDigits",
                format!("{} digit ids cannot cover {} sessions", session.id_digits, session.max_sessions),
            );
        }
    }
    if session.id_retries == 0 {
        report.warn("session.idRetries", "idRetries is 0; every id collision will reject the offer");
    }
}

fn validate_services(config: &LiveTalkConfig, report: &mut ValidationReport) {
    if !TTS_ENGINES.contains(&config.tts.engine.as_str()) {
        report.error(
            "tts.engine",
            format!("Unknown TTS engine '{}'; expected one of {:?}", config.tts.engine, TTS_ENGINES),
        );
    }
    if config.tts.engine == "indextts" && config.tts.server.trim().is_empty() {
        report.error("tts.server", "IndexTTS requires a server URL");
    }
    if !RESPONDERS.contains(&config.chat.responder.as_str()) {
        report.error(
            "chat.responder",
            format!("Unknown responder '{}'; expected one of {:?}", config.chat.responder, RESPONDERS),
        );
    }
    if config.chat.responder == "openai" && config.chat.api_key.is_none() {
        report.warn("chat.apiKey", "No API key set for the openai responder");
    }
    if config.server.listen_port < 1024 {
        report.warn(
            "server.listenPort",
            format!("Port {} requires elevated privileges", config.server.listen_port),
        );
    }
}

fn validate_transport(config: &LiveTalkConfig, report: &mut ValidationReport) {
    if config.transport.video_codec_priority.is_empty() {
        report.warn(
            "transport.videoCodecPriority",
            "Empty codec priority; the transport's default ordering will be used",
        );
    }
    for (i, mime) in config.transport.video_codec_priority.iter().enumerate() {
        if !mime.contains('/') {
            report.error(
                format!("transport.videoCodecPriority[{i}]"),
                format!("'{mime}' is not a mime type such as video/H264"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let report = validate(&LiveTalkConfig::default());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn unknown_model_is_an_error() {
        let mut cfg = LiveTalkConfig::default();
        cfg.model.kind = "sadtalker".into();
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "model.kind"));
    }

    #[test]
    fn zero_sessions_rejected() {
        let mut cfg = LiveTalkConfig::default();
        cfg.session.max_sessions = 0;
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn id_space_must_cover_cap() {
        let mut cfg = LiveTalkConfig::default();
        cfg.session.id_digits = 4;
        cfg.session.max_sessions = 10_000;
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "session.idDigits"));
    }

    #[test]
    fn empty_codec_priority_is_only_a_warning() {
        let mut cfg = LiveTalkConfig::default();
        cfg.transport.video_codec_priority.clear();
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn unknown_tts_engine_rejected() {
        let mut cfg = LiveTalkConfig::default();
        cfg.tts.engine = "festival".into();
        assert!(validate(&cfg).errors.iter().any(|e| e.path == "tts.engine"));
    }
}
