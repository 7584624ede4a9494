use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::connection::ConnectionState;
use crate::error::LiveTalkError;
use crate::media::{AudioFrame, CodecCapability, MediaFrame, MediaKind, PcmAudio, VideoFrame};
use crate::types::{ModelKind, PlaybackState, SessionDescription, SessionId};

/// Per-session renderer turning text and audio into output frames.
///
/// Every method is non-blocking: work is queued and picked up by the
/// renderer's own synthesis task. Frames are pulled by the transport.
pub trait Renderer: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn produce_audio_frame(&self) -> AudioFrame;

    fn produce_video_frame(&self) -> VideoFrame;

    /// Queue text for synthesis.
    fn accept_text(&self, text: String);

    /// Queue a stored audio file for playback.
    fn accept_audio_file(&self, path: PathBuf);

    /// Drop queued and in-flight output. A no-op when nothing is queued.
    fn flush(&self);

    fn set_playback_state(&self, state: PlaybackState);

    /// Release the renderer's resources. Safe to call more than once.
    fn release(&self);
}

/// A pull-based media producer attached to a transport.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> MediaKind;

    fn next_frame(&self) -> MediaFrame;
}

/// The negotiated peer transport for one session.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    fn id(&self) -> &str;

    fn connection_state(&self) -> ConnectionState;

    /// Take the connectivity notification stream. Only the first caller gets it.
    fn take_state_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionState>>;

    fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), LiveTalkError>;

    /// Codecs the transport can send for `kind`, in its native order.
    fn codec_capabilities(&self, kind: MediaKind) -> Vec<CodecCapability>;

    fn set_codec_preferences(
        &self,
        kind: MediaKind,
        codecs: Vec<CodecCapability>,
    ) -> Result<(), LiveTalkError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), LiveTalkError>;

    async fn create_answer(&self) -> Result<SessionDescription, LiveTalkError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), LiveTalkError>;

    fn local_description(&self) -> Option<SessionDescription>;

    /// Close the transport. Idempotent.
    async fn close(&self);
}

/// Creates one transport per admitted session.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, session_id: SessionId) -> Result<Arc<dyn PeerTransport>, LiveTalkError>;
}

/// Text-to-speech engine used by the renderers' synthesis task.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<PcmAudio>;
}

/// Produces the reply spoken for a `chat` command.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    fn name(&self) -> &str;

    async fn respond(&self, message: &str) -> Result<String>;
}
