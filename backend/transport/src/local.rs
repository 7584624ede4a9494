use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use livetalk_core::{
    CodecCapability, ConnectionState, LiveTalkError, MediaKind, MediaTrack, PeerTransport,
    SdpType, SessionDescription, SessionId, TransportFactory, AUDIO_FRAMES_PER_SECOND,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sdp::{build_answer, parse_media_sections, MediaSection};

#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Video frames per second pulled by the pump.
    pub fps: u32,
    /// Report `connecting` then `connected` once the local answer is set.
    pub auto_connect: bool,
    pub ice_servers: Vec<String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self { fps: 50, auto_connect: true, ice_servers: Vec::new() }
    }
}

/// Video codecs in the order the transport advertises them.
fn video_capabilities() -> Vec<CodecCapability> {
    vec![
        CodecCapability::new("video/VP8", 90_000),
        CodecCapability::new("video/H264", 90_000)
            .with_fmtp("level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"),
        CodecCapability::new("video/rtx", 90_000),
        CodecCapability::new("video/H264", 90_000)
            .with_fmtp("level-asymmetry-allowed=1;packetization-mode=0;profile-level-id=42e01f"),
    ]
}

fn audio_capabilities() -> Vec<CodecCapability> {
    vec![
        CodecCapability::new("audio/opus", 48_000).with_fmtp("minptime=10;useinbandfec=1"),
        CodecCapability::new("audio/PCMU", 8_000),
    ]
}

/// Spreads `fps` video frames over the fixed audio tick rate.
#[derive(Debug)]
struct VideoClock {
    fps: u32,
    credit: u32,
}

impl VideoClock {
    fn new(fps: u32) -> Self {
        Self { fps: fps.max(1), credit: 0 }
    }

    /// Video frames owed for one audio tick.
    fn frames_due(&mut self) -> u32 {
        self.credit += self.fps;
        let due = self.credit / AUDIO_FRAMES_PER_SECOND;
        self.credit %= AUDIO_FRAMES_PER_SECOND;
        due
    }
}

pub struct LocalTransport {
    id: String,
    session_id: SessionId,
    options: TransportOptions,
    state: Mutex<ConnectionState>,
    events_tx: mpsc::UnboundedSender<ConnectionState>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionState>>>,
    tracks: Mutex<Vec<Arc<dyn MediaTrack>>>,
    preferences: Mutex<HashMap<MediaKind, Vec<CodecCapability>>>,
    remote_sections: Mutex<Option<Vec<MediaSection>>>,
    local: Mutex<Option<SessionDescription>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    frames_sent: Arc<AtomicU64>,
}

impl LocalTransport {
    pub fn new(session_id: SessionId, options: TransportOptions) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: format!("pc-{}", uuid::Uuid::new_v4()),
            session_id,
            options,
            state: Mutex::new(ConnectionState::New),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            tracks: Mutex::new(Vec::new()),
            preferences: Mutex::new(HashMap::new()),
            remote_sections: Mutex::new(None),
            local: Mutex::new(None),
            pump: Mutex::new(None),
            frames_sent: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Record a connectivity change and notify the listener. Repeats of the
    /// current state are dropped and nothing follows `closed`.
    pub fn report(&self, next: ConnectionState) {
        {
            let mut state = self.state.lock();
            if *state == next || *state == ConnectionState::Closed {
                return;
            }
            let prev = *state;
            *state = next;
            debug!(session_id = %self.session_id, from = %prev, to = %next, "Connection state");
        }
        if next.is_terminal() {
            self.stop_pump();
        }
        // The receiver is gone once the session stopped listening.
        let _ = self.events_tx.send(next);
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.lock().len()
    }

    pub fn codec_preferences(&self, kind: MediaKind) -> Option<Vec<CodecCapability>> {
        self.preferences.lock().get(&kind).cloned()
    }

    fn ensure_open(&self) -> Result<(), LiveTalkError> {
        if self.state.lock().is_terminal() {
            return Err(LiveTalkError::TransportFailure(format!("transport {} is closed", self.id)));
        }
        Ok(())
    }

    fn codecs_for(&self, kind: MediaKind) -> Vec<CodecCapability> {
        self.preferences
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.codec_capabilities(kind))
    }

    fn start_pump(&self) {
        let tracks = self.tracks.lock().clone();
        if tracks.is_empty() {
            return;
        }
        let tick = Duration::from_millis(1000 / u64::from(AUDIO_FRAMES_PER_SECOND));
        let mut video_clock = VideoClock::new(self.options.fps);
        let frames_sent = Arc::clone(&self.frames_sent);
        let session_id = self.session_id;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let video_due = video_clock.frames_due();
                for track in &tracks {
                    let count = match track.kind() {
                        MediaKind::Audio => 1,
                        MediaKind::Video => video_due,
                    };
                    for _ in 0..count {
                        let _frame = track.next_frame();
                        frames_sent.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });
        debug!(session_id = %session_id, "Frame pump started");

        if let Some(old) = self.pump.lock().replace(handle) {
            old.abort();
        }
    }

    fn stop_pump(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

#[async_trait]
impl PeerTransport for LocalTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn take_state_events(&self) -> Option<mpsc::UnboundedReceiver<ConnectionState>> {
        self.events_rx.lock().take()
    }

    fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), LiveTalkError> {
        self.ensure_open()?;
        self.tracks.lock().push(track);
        Ok(())
    }

    fn codec_capabilities(&self, kind: MediaKind) -> Vec<CodecCapability> {
        match kind {
            MediaKind::Audio => audio_capabilities(),
            MediaKind::Video => video_capabilities(),
        }
    }

    fn set_codec_preferences(
        &self,
        kind: MediaKind,
        codecs: Vec<CodecCapability>,
    ) -> Result<(), LiveTalkError> {
        if codecs.is_empty() {
            return Err(LiveTalkError::CodecPreferenceFailure("empty codec list".into()));
        }
        if !self.tracks.lock().iter().any(|t| t.kind() == kind) {
            return Err(LiveTalkError::CodecPreferenceFailure(format!(
                "no {kind:?} transceiver to apply preferences to"
            )));
        }
        let supported = self.codec_capabilities(kind);
        if let Some(unknown) = codecs.iter().find(|c| !supported.contains(c)) {
            return Err(LiveTalkError::CodecPreferenceFailure(format!(
                "codec {} is not supported",
                unknown.mime_type
            )));
        }
        self.preferences.lock().insert(kind, codecs);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), LiveTalkError> {
        self.ensure_open()?;
        if desc.kind != SdpType::Offer {
            return Err(LiveTalkError::Negotiation(format!(
                "expected an offer, got {:?}",
                desc.kind
            )));
        }
        let sections = parse_media_sections(&desc.sdp)?;
        if sections.is_empty() {
            return Err(LiveTalkError::Negotiation("offer has no audio or video section".into()));
        }
        *self.remote_sections.lock() = Some(sections);
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, LiveTalkError> {
        self.ensure_open()?;
        let sections = self
            .remote_sections
            .lock()
            .clone()
            .ok_or_else(|| LiveTalkError::Negotiation("no remote offer set".into()))?;
        let sdp = build_answer(&self.session_id.to_string(), &sections, |kind| self.codecs_for(kind));
        Ok(SessionDescription::answer(sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), LiveTalkError> {
        self.ensure_open()?;
        if desc.kind != SdpType::Answer {
            return Err(LiveTalkError::Negotiation(format!(
                "expected an answer, got {:?}",
                desc.kind
            )));
        }
        *self.local.lock() = Some(desc);
        if !self.options.ice_servers.is_empty() {
            debug!(session_id = %self.session_id, servers = ?self.options.ice_servers, "ICE servers");
        }
        if self.options.auto_connect {
            self.report(ConnectionState::Connecting);
            self.report(ConnectionState::Connected);
            self.start_pump();
        }
        Ok(())
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    async fn close(&self) {
        if self.connection_state() == ConnectionState::Closed {
            return;
        }
        self.stop_pump();
        self.tracks.lock().clear();
        self.report(ConnectionState::Closed);
        info!(session_id = %self.session_id, id = %self.id, "Transport closed");
    }
}

/// Creates [`LocalTransport`]s and keeps weak handles so connectivity
/// changes can be injected per session.
pub struct LocalTransportFactory {
    options: TransportOptions,
    transports: Mutex<HashMap<SessionId, Weak<LocalTransport>>>,
}

impl LocalTransportFactory {
    pub fn new(options: TransportOptions) -> Self {
        Self { options, transports: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, session_id: SessionId) -> Option<Arc<LocalTransport>> {
        self.transports.lock().get(&session_id).and_then(Weak::upgrade)
    }
}

#[async_trait]
impl TransportFactory for LocalTransportFactory {
    async fn create(&self, session_id: SessionId) -> Result<Arc<dyn PeerTransport>, LiveTalkError> {
        let transport = LocalTransport::new(session_id, self.options.clone());
        let mut transports = self.transports.lock();
        transports.retain(|_, weak| weak.strong_count() > 0);
        if transports.insert(session_id, Arc::downgrade(&transport)).is_some() {
            warn!(session_id = %session_id, "Replacing transport handle for reused session id");
        }
        Ok(transport)
    }
}
