//! Connection negotiation state machine.
//!
//! ```text
//! New ──offer──▶ HaveRemoteOffer ──answer──▶ Answered ──connected──▶ Connected
//!  └──────────────────┴──────────────────────────┴───────────────────────┴──▶ Failed | Closed
//! ```
//!
//! Terminal states absorb every later event. Entering one trips a one-shot
//! latch that runs session cleanup exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use livetalk_core::{
    ConnectionState, LiveTalkError, PeerTransport, SessionDescription, SessionId, SessionState,
};
use livetalk_logging::{SessionEvent, SessionEventLogger};
use livetalk_render::HumanPlayer;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::apply_codec_preferences;
use crate::lifecycle::SessionLifecycle;
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    New,
    HaveRemoteOffer,
    Answered,
    Connected,
    Failed,
    Closed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationEvent {
    RemoteOffer,
    Answered,
    Transport(ConnectionState),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid negotiation transition from {from:?} on {event:?}")]
pub struct TransitionError {
    pub from: NegotiationState,
    pub event: NegotiationEvent,
}

/// Pure transition function.
pub fn next_state(
    current: NegotiationState,
    event: NegotiationEvent,
) -> Result<NegotiationState, TransitionError> {
    use NegotiationEvent as E;
    use NegotiationState as S;

    if current.is_terminal() {
        return Ok(current);
    }
    match (current, event) {
        (_, E::Transport(ConnectionState::Failed)) => Ok(S::Failed),
        (_, E::Transport(ConnectionState::Closed)) | (_, E::Shutdown) => Ok(S::Closed),
        // Progress notifications carry no transition.
        (s, E::Transport(ConnectionState::New | ConnectionState::Connecting))
        | (s, E::Transport(ConnectionState::Disconnected)) => Ok(s),
        (S::New, E::RemoteOffer) => Ok(S::HaveRemoteOffer),
        (S::HaveRemoteOffer, E::Answered) => Ok(S::Answered),
        (S::Answered | S::Connected, E::Transport(ConnectionState::Connected)) => Ok(S::Connected),
        (from, event) => Err(TransitionError { from, event }),
    }
}

/// Fires at most once.
#[derive(Debug, Default)]
pub struct CleanupLatch {
    fired: AtomicBool,
}

impl CleanupLatch {
    /// `true` only for the first caller.
    pub fn trip(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }

    pub fn is_tripped(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

pub struct Negotiator {
    session_id: SessionId,
    state: Mutex<NegotiationState>,
    latch: CleanupLatch,
    registry: Arc<SessionRegistry>,
    lifecycle: Arc<SessionLifecycle>,
}

impl Negotiator {
    pub fn new(
        session_id: SessionId,
        registry: Arc<SessionRegistry>,
        lifecycle: Arc<SessionLifecycle>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            state: Mutex::new(NegotiationState::New),
            latch: CleanupLatch::default(),
            registry,
            lifecycle,
        })
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.lock()
    }

    /// Apply `event`; on entering a terminal state run cleanup once.
    pub async fn handle_event(&self, event: NegotiationEvent) -> Result<NegotiationState, TransitionError> {
        self.apply(event).await.map(|(state, _)| state)
    }

    /// Like [`handle_event`](Self::handle_event), also reporting whether
    /// this call tore the session down.
    async fn apply(&self, event: NegotiationEvent) -> Result<(NegotiationState, bool), TransitionError> {
        let (prev, next) = {
            let mut state = self.state.lock();
            let prev = *state;
            let next = next_state(prev, event)?;
            *state = next;
            (prev, next)
        };

        if prev != next {
            debug!(session_id = %self.session_id, from = ?prev, to = ?next, "Negotiation state");
        }
        if next == NegotiationState::Connected && prev != NegotiationState::Connected {
            info!(session_id = %self.session_id, "Connection established");
            if let Ok(from) = self.registry.set_state(self.session_id, SessionState::Connected) {
                SessionEventLogger::log(
                    Some(self.session_id),
                    SessionEvent::StateChanged { from, to: SessionState::Connected },
                );
            }
        }
        let mut cleaned = false;
        if next.is_terminal() && self.latch.trip() {
            let reason = match (next, event) {
                (NegotiationState::Failed, _) => "connection failed",
                (_, NegotiationEvent::Shutdown) => "shutdown",
                _ => "connection closed",
            };
            cleaned = self.lifecycle.cleanup(self.session_id, reason).await;
        }
        Ok((next, cleaned))
    }

    async fn advance(&self, event: NegotiationEvent) -> Result<(), LiveTalkError> {
        let state = self
            .handle_event(event)
            .await
            .map_err(|e| LiveTalkError::Negotiation(e.to_string()))?;
        if state.is_terminal() {
            return Err(LiveTalkError::SessionClosed(self.session_id));
        }
        Ok(())
    }

    /// Drive the handshake for `offer` and return the local answer.
    ///
    /// Tracks are attached and codec preferences applied before the remote
    /// description, so the answer reflects them.
    pub async fn negotiate<S: AsRef<str>>(
        &self,
        transport: &dyn PeerTransport,
        player: &HumanPlayer,
        codec_priority: &[S],
        offer: SessionDescription,
    ) -> Result<SessionDescription, LiveTalkError> {
        self.advance(NegotiationEvent::RemoteOffer).await?;

        for track in player.tracks() {
            transport.add_track(track)?;
        }
        // Not fatal: the transport falls back to its default ordering.
        let _ = apply_codec_preferences(transport, codec_priority);

        transport.set_remote_description(offer).await?;
        let answer = transport.create_answer().await?;
        self.advance(NegotiationEvent::Answered).await?;
        transport.set_local_description(answer).await?;

        let local = transport
            .local_description()
            .ok_or_else(|| LiveTalkError::Negotiation("transport has no local description".into()))?;
        info!(session_id = %self.session_id, "SDP negotiation complete");
        Ok(local)
    }

    /// Feed transport connectivity notifications into the state machine
    /// until a terminal state is reached.
    pub fn spawn_watch(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<ConnectionState>,
    ) -> JoinHandle<()> {
        let negotiator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(conn) = events.recv().await {
                info!(session_id = %negotiator.session_id, state = %conn, "Connection state changed");
                match negotiator.handle_event(NegotiationEvent::Transport(conn)).await {
                    Ok(state) if state.is_terminal() => break,
                    Ok(_) => {}
                    Err(e) => warn!(session_id = %negotiator.session_id, error = %e, "Ignoring transport event"),
                }
            }
        })
    }

    /// Close the session from the server side. `true` when this call
    /// performed the cleanup.
    pub async fn shutdown(&self) -> bool {
        match self.apply(NegotiationEvent::Shutdown).await {
            Ok((_, cleaned)) => cleaned,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Shutdown event rejected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingRenderer;
    use livetalk_transport::{LocalTransport, TransportOptions};
    use std::time::Duration;
    use NegotiationEvent as E;
    use NegotiationState as S;

    const OFFER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:0\r\n\
        m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\na=mid:1\r\n";

    #[test]
    fn happy_path_transitions() {
        assert_eq!(next_state(S::New, E::RemoteOffer), Ok(S::HaveRemoteOffer));
        assert_eq!(next_state(S::HaveRemoteOffer, E::Answered), Ok(S::Answered));
        assert_eq!(next_state(S::Answered, E::Transport(ConnectionState::Connected)), Ok(S::Connected));
    }

    #[test]
    fn failure_and_close_from_any_live_state() {
        for s in [S::New, S::HaveRemoteOffer, S::Answered, S::Connected] {
            assert_eq!(next_state(s, E::Transport(ConnectionState::Failed)), Ok(S::Failed));
            assert_eq!(next_state(s, E::Transport(ConnectionState::Closed)), Ok(S::Closed));
            assert_eq!(next_state(s, E::Shutdown), Ok(S::Closed));
        }
    }

    #[test]
    fn terminal_states_absorb() {
        assert_eq!(next_state(S::Failed, E::Transport(ConnectionState::Closed)), Ok(S::Failed));
        assert_eq!(next_state(S::Closed, E::RemoteOffer), Ok(S::Closed));
    }

    #[test]
    fn out_of_order_events_rejected() {
        assert!(next_state(S::New, E::Answered).is_err());
        assert!(next_state(S::HaveRemoteOffer, E::RemoteOffer).is_err());
        assert!(next_state(S::New, E::Transport(ConnectionState::Connected)).is_err());
        assert_eq!(next_state(S::Answered, E::Transport(ConnectionState::Disconnected)), Ok(S::Answered));
    }

    #[test]
    fn latch_trips_once() {
        let latch = CleanupLatch::default();
        assert!(latch.trip());
        assert!(!latch.trip());
        assert!(latch.is_tripped());
    }

    fn fixture(id: SessionId) -> (Arc<SessionRegistry>, Arc<Negotiator>) {
        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Arc::new(SessionLifecycle::new(Arc::clone(&registry)));
        registry.reserve_pending(id).unwrap();
        (Arc::clone(&registry), Negotiator::new(id, registry, lifecycle))
    }

    #[tokio::test]
    async fn repeated_terminal_events_clean_up_once() {
        let id = SessionId(10);
        let (registry, negotiator) = fixture(id);
        let renderer = CountingRenderer::new();
        registry.attach_renderer(id, renderer.clone()).unwrap();

        negotiator.handle_event(E::Transport(ConnectionState::Failed)).await.unwrap();
        negotiator.handle_event(E::Transport(ConnectionState::Closed)).await.unwrap();
        negotiator.shutdown().await;

        assert_eq!(negotiator.state(), S::Failed);
        assert_eq!(renderer.release_count(), 1);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_mid_handshake_and_cleans_up_once() {
        let id = SessionId(14);
        let (registry, negotiator) = fixture(id);
        let renderer = CountingRenderer::new();
        registry.attach_renderer(id, renderer.clone()).unwrap();
        negotiator.handle_event(E::RemoteOffer).await.unwrap();

        assert!(negotiator.shutdown().await);
        assert!(!negotiator.shutdown().await);
        assert_eq!(negotiator.state(), S::Closed);
        assert_eq!(renderer.release_count(), 1);
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn negotiate_then_connect() {
        let id = SessionId(11);
        let (registry, negotiator) = fixture(id);
        let transport = LocalTransport::new(id, TransportOptions::default());
        registry.attach_connection(id, transport.clone()).unwrap();
        let watcher = negotiator.spawn_watch(transport.take_state_events().unwrap());
        let player = HumanPlayer::new(CountingRenderer::new());

        let answer = negotiator
            .negotiate(transport.as_ref(), &player, &["video/H264", "video/VP8", "video/rtx"], SessionDescription::offer(OFFER))
            .await
            .unwrap();
        assert!(answer.sdp.starts_with("v=0"));
        let video = answer.sdp.split("m=video").nth(1).unwrap();
        assert!(video.find("H264").unwrap() < video.find("VP8").unwrap());

        for _ in 0..100 {
            if negotiator.state() == S::Connected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(negotiator.state(), S::Connected);
        assert_eq!(registry.state(id), Some(SessionState::Connected));

        transport.report(ConnectionState::Closed);
        watcher.await.unwrap();
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn bad_offer_is_a_negotiation_error() {
        let id = SessionId(12);
        let (_registry, negotiator) = fixture(id);
        let transport = LocalTransport::new(id, TransportOptions::default());
        let player = HumanPlayer::new(CountingRenderer::new());
        let err = negotiator
            .negotiate(transport.as_ref(), &player, &DEFAULT_PRIORITY, SessionDescription::offer("garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, LiveTalkError::Negotiation(_)));
    }

    const DEFAULT_PRIORITY: [&str; 3] = crate::codec::DEFAULT_VIDEO_CODEC_PRIORITY;

    #[tokio::test]
    async fn negotiate_after_failure_reports_closed() {
        let id = SessionId(13);
        let (_registry, negotiator) = fixture(id);
        negotiator.handle_event(E::Transport(ConnectionState::Failed)).await.unwrap();
        let transport = LocalTransport::new(id, TransportOptions::default());
        let player = HumanPlayer::new(CountingRenderer::new());
        let err = negotiator
            .negotiate(transport.as_ref(), &player, &DEFAULT_PRIORITY, SessionDescription::offer(OFFER))
            .await
            .unwrap_err();
        assert!(matches!(err, LiveTalkError::SessionClosed(_)));
    }
}
