//! The entry point the HTTP layer talks to.

use std::collections::HashMap;
use std::sync::Arc;

use livetalk_core::{
    ChatResponder, LiveTalkError, ModelKind, SessionDescription, SessionId, SessionState, TransportFactory,
};
use livetalk_logging::{SessionEvent, SessionEventLogger};
use livetalk_render::HumanPlayer;
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::admission::AdmissionController;
use crate::codec::DEFAULT_VIDEO_CODEC_PRIORITY;
use crate::dispatcher::{Command, CommandDispatcher, Dispatched};
use crate::factory::RendererFactory;
use crate::lifecycle::SessionLifecycle;
use crate::negotiator::Negotiator;
use crate::registry::{SessionRegistry, SessionSummary};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_sessions: usize,
    pub id_digits: u32,
    pub id_retries: u32,
    pub video_codec_priority: Vec<String>,
    pub responder_workers: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: 1,
            id_digits: 6,
            id_retries: 8,
            video_codec_priority: DEFAULT_VIDEO_CODEC_PRIORITY.iter().map(|s| s.to_string()).collect(),
            responder_workers: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OfferAnswer {
    pub session_id: SessionId,
    pub answer: SessionDescription,
}

struct Inner {
    registry: Arc<SessionRegistry>,
    admission: AdmissionController,
    factory: RendererFactory,
    transports: Arc<dyn TransportFactory>,
    lifecycle: Arc<SessionLifecycle>,
    /// Negotiators whose connection watch is still running.
    negotiators: Arc<Mutex<HashMap<SessionId, Arc<Negotiator>>>>,
    dispatcher: CommandDispatcher,
    codec_priority: Vec<String>,
}

/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        settings: SessionSettings,
        factory: RendererFactory,
        transports: Arc<dyn TransportFactory>,
        responder: Arc<dyn ChatResponder>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let admission = AdmissionController::new(
            Arc::clone(&registry),
            settings.max_sessions,
            settings.id_digits,
            settings.id_retries,
        );
        let lifecycle = Arc::new(SessionLifecycle::new(Arc::clone(&registry)));
        let dispatcher = CommandDispatcher::new(Arc::clone(&registry), responder, settings.responder_workers);
        Self {
            inner: Arc::new(Inner {
                registry,
                admission,
                factory,
                transports,
                lifecycle,
                negotiators: Arc::new(Mutex::new(HashMap::new())),
                dispatcher,
                codec_priority: settings.video_codec_priority,
            }),
        }
    }

    /// Admit a session for `offer` and return its id with the local answer.
    ///
    /// Setup runs on its own task so a caller that goes away cannot leave a
    /// half-built session behind. Any setup failure tears the session down.
    #[instrument(skip_all)]
    pub async fn offer(&self, offer: SessionDescription) -> Result<OfferAnswer, LiveTalkError> {
        let session_id = self.inner.admission.try_admit()?;
        info!(session_id = %session_id, "Session admitted");

        let inner = Arc::clone(&self.inner);
        let result = tokio::spawn(async move {
            let result = inner.establish(session_id, offer).await;
            if let Err(e) = &result {
                warn!(session_id = %session_id, error = %e, "Session setup failed");
                inner.negotiators.lock().remove(&session_id);
                inner.lifecycle.cleanup(session_id, "setup failed").await;
            }
            result
        })
        .await
        .map_err(|e| LiveTalkError::Other(anyhow::anyhow!("session setup task failed: {e}")))?;

        result.map(|answer| OfferAnswer { session_id, answer })
    }

    pub fn dispatch(&self, session_id: SessionId, command: Command) -> Result<Dispatched, LiveTalkError> {
        self.inner.dispatcher.dispatch(session_id, command)
    }

    pub fn count(&self) -> usize {
        self.inner.registry.count()
    }

    pub fn max_sessions(&self) -> usize {
        self.inner.admission.max_sessions()
    }

    pub fn model(&self) -> ModelKind {
        self.inner.factory.kind()
    }

    pub fn snapshot(&self) -> Vec<SessionSummary> {
        self.inner.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    /// Tear down every session. Returns how many were cleaned up.
    ///
    /// Sessions with a negotiator close through its state machine; the
    /// rest (still being admitted) are cleaned up directly.
    pub async fn shutdown(&self) -> usize {
        for session in self.snapshot() {
            info!(
                session_id = %session.session_id,
                state = %session.state,
                age_secs = session.age_secs,
                renderer_attached = session.renderer_attached,
                "Closing session"
            );
        }
        let negotiators: Vec<Arc<Negotiator>> =
            self.inner.negotiators.lock().drain().map(|(_, n)| n).collect();
        let mut cleaned = 0;
        for negotiator in negotiators {
            if negotiator.shutdown().await {
                cleaned += 1;
            }
        }
        cleaned += self.inner.lifecycle.shutdown_all().await;
        info!(cleaned, "Session manager shut down");
        cleaned
    }
}

impl Inner {
    async fn establish(
        &self,
        session_id: SessionId,
        offer: SessionDescription,
    ) -> Result<SessionDescription, LiveTalkError> {
        let transport = self.transports.create(session_id).await?;
        if self.registry.attach_connection(session_id, Arc::clone(&transport)).is_err() {
            transport.close().await;
            return Err(LiveTalkError::SessionClosed(session_id));
        }

        let negotiator = Negotiator::new(session_id, Arc::clone(&self.registry), Arc::clone(&self.lifecycle));
        self.negotiators.lock().insert(session_id, Arc::clone(&negotiator));
        if let Some(events) = transport.take_state_events() {
            let watch = negotiator.spawn_watch(events);
            let negotiators = Arc::clone(&self.negotiators);
            tokio::spawn(async move {
                let _ = watch.await;
                negotiators.lock().remove(&session_id);
            });
        }

        let renderer = self.factory.build(session_id).await?;
        if self.registry.attach_renderer(session_id, Arc::clone(&renderer)).is_err() {
            // Torn down while the renderer was being built.
            renderer.release();
            SessionEventLogger::log(
                Some(session_id),
                SessionEvent::RendererDiscarded { model: renderer.kind().to_string() },
            );
            return Err(LiveTalkError::SessionClosed(session_id));
        }
        SessionEventLogger::log(
            Some(session_id),
            SessionEvent::RendererAttached { model: renderer.kind().to_string() },
        );
        if let Ok(from) = self.registry.set_state(session_id, SessionState::Negotiating) {
            SessionEventLogger::log(
                Some(session_id),
                SessionEvent::StateChanged { from, to: SessionState::Negotiating },
            );
        }

        let player = HumanPlayer::new(renderer);
        negotiator
            .negotiate(transport.as_ref(), &player, self.codec_priority.as_slice(), offer)
            .await
    }
}
