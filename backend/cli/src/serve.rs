//! `livetalk serve`: load config, wire the components and run the gateway.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use livetalk_config::LiveTalkConfig;
use livetalk_core::{ChatResponder, ModelKind, TtsProvider};
use livetalk_gateway::{shutdown_signal, start_server, GatewayState};
use livetalk_media::AudioStore;
use livetalk_render::{AssetOptions, SharedAssets};
use livetalk_session::{EchoResponder, OpenAiResponder, RendererFactory, SessionManager, SessionSettings};
use livetalk_transport::{LocalTransportFactory, TransportOptions};
use livetalk_tts::{create_tts, TtsProviderKind};
use tracing::info;

use crate::ServeArgs;

pub async fn run(args: ServeArgs) -> Result<()> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| livetalk_config::config_file_path(&livetalk_config::config_dir()));
    let config = livetalk_config::load_and_prepare(&path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let config = apply_args(config, args);
    livetalk_config::ensure_valid(&config)?;

    livetalk_logging::init_logger(config.logging.dir.as_deref().map(Path::new), &config.logging.level);
    run_server(config).await
}

/// Overlay command-line flags on the loaded config.
pub fn apply_args(mut config: LiveTalkConfig, args: ServeArgs) -> LiveTalkConfig {
    if let Some(model) = args.model {
        config.model.kind = model;
    }
    if let Some(avatar_id) = args.avatar_id {
        config.model.avatar_id = avatar_id;
    }
    if let Some(max) = args.max_session {
        config.session.max_sessions = max;
    }
    if let Some(port) = args.listenport {
        config.server.listen_port = port;
    }
    if let Some(fps) = args.fps {
        config.model.fps = fps;
    }
    if let Some(width) = args.width {
        config.model.width = width;
    }
    if let Some(height) = args.height {
        config.model.height = height;
    }
    if let Some(batch) = args.batch_size {
        config.model.batch_size = batch;
    }
    if let Some(engine) = args.tts {
        config.tts.engine = engine;
    }
    if let Some(server) = args.tts_server {
        config.tts.server = server;
    }
    if args.ref_file.is_some() {
        config.tts.ref_file = args.ref_file;
    }
    if args.ref_text.is_some() {
        config.tts.ref_text = args.ref_text;
    }
    config
}

fn tts_kind(config: &LiveTalkConfig) -> TtsProviderKind {
    match config.tts.engine.as_str() {
        "silent" => TtsProviderKind::Silent,
        _ => TtsProviderKind::IndexTts {
            server: config.tts.server.clone(),
            voice_id: config.tts.voice_id.clone(),
            ref_file: config.tts.ref_file.as_ref().map(PathBuf::from),
            ref_text: config.tts.ref_text.clone(),
            timeout: Duration::from_secs(config.tts.timeout_secs),
        },
    }
}

fn responder(config: &LiveTalkConfig) -> Arc<dyn ChatResponder> {
    match config.chat.responder.as_str() {
        "openai" => Arc::new(
            OpenAiResponder::new(&config.chat.base_url, &config.chat.model)
                .with_api_key(config.chat.api_key.clone())
                .with_system_prompt(config.chat.system_prompt.clone()),
        ),
        _ => Arc::new(EchoResponder::new(&config.chat.reply_prefix)),
    }
}

async fn run_server(config: LiveTalkConfig) -> Result<()> {
    info!(
        model = %config.model.kind,
        avatar = %config.model.avatar_id,
        max_sessions = config.session.max_sessions,
        port = config.server.listen_port,
        "Starting LiveTalk server"
    );

    let kind: ModelKind = config.model.kind.parse()?;
    let avatar_root = PathBuf::from(&config.model.avatar_root);
    let assets = SharedAssets::load(AssetOptions {
        kind,
        avatar_root: &avatar_root,
        avatar_id: &config.model.avatar_id,
        fps: config.model.fps,
        width: config.model.width,
        height: config.model.height,
        batch_size: config.model.batch_size,
    })?;

    let tts: Arc<dyn TtsProvider> = Arc::from(create_tts(tts_kind(&config))?);
    info!(engine = tts.name(), "TTS provider ready");

    let factory = RendererFactory::new(&config.model.kind, assets, tts, config.session.build_workers)?;
    let transports = Arc::new(LocalTransportFactory::new(TransportOptions {
        fps: config.model.fps,
        auto_connect: true,
        ice_servers: config.transport.ice_servers.clone(),
    }));
    let settings = SessionSettings {
        max_sessions: config.session.max_sessions,
        id_digits: config.session.id_digits,
        id_retries: config.session.id_retries,
        video_codec_priority: config.transport.video_codec_priority.clone(),
        responder_workers: config.session.responder_workers,
    };
    let manager = SessionManager::new(settings, factory, transports, responder(&config));

    let state = GatewayState::new(manager, AudioStore::new(&config.audio.upload_dir));
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.listen_port)
        .parse()
        .context("Invalid bind address")?;
    start_server(addr, state, shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let mut config = LiveTalkConfig::default();
        config.model.avatar_id = "from_file".into();
        let config = apply_args(
            config,
            ServeArgs {
                model: Some("ultralight".into()),
                max_session: Some(4),
                ref_text: Some("参考".into()),
                ..Default::default()
            },
        );
        assert_eq!(config.model.kind, "ultralight");
        assert_eq!(config.model.avatar_id, "from_file");
        assert_eq!(config.session.max_sessions, 4);
        assert_eq!(config.tts.ref_text.as_deref(), Some("参考"));
        assert!(config.tts.ref_file.is_none());
    }

    #[test]
    fn silent_engine_selected_by_name() {
        let mut config = LiveTalkConfig::default();
        config.tts.engine = "silent".into();
        assert!(matches!(tts_kind(&config), TtsProviderKind::Silent));
        config.tts.engine = "indextts".into();
        assert!(matches!(tts_kind(&config), TtsProviderKind::IndexTts { .. }));
    }

    #[tokio::test]
    async fn echo_responder_uses_reply_prefix() {
        let mut config = LiveTalkConfig::default();
        config.chat.reply_prefix = "> ".into();
        assert_eq!(responder(&config).respond("hi").await.unwrap(), "> hi");
    }
}
