//! Routes client commands to a session's renderer.

use std::path::PathBuf;
use std::sync::Arc;

use livetalk_core::{ChatResponder, LiveTalkError, PlaybackState, SessionId};
use livetalk_logging::{SessionEvent, SessionEventLogger};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Cancel queued and in-flight speech.
    Interrupt,
    /// Speak the text as given.
    Echo(String),
    /// Speak the responder's reply to the text.
    Chat(String),
    /// Play an already stored audio file.
    AudioFile(PathBuf),
    SetPlaybackState(PlaybackState),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::Echo(_) => "echo",
            Self::Chat(_) => "chat",
            Self::AudioFile(_) => "audio_file",
            Self::SetPlaybackState(_) => "set_playback_state",
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Self::Echo(t) | Self::Chat(t) => Some(t.chars().take(50).collect()),
            Self::AudioFile(p) => Some(p.display().to_string()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum Dispatched {
    Delivered,
    /// A chat reply is being produced; the handle resolves once it was
    /// handed to the renderer or dropped.
    Deferred(JoinHandle<()>),
}

pub struct CommandDispatcher {
    registry: Arc<SessionRegistry>,
    responder: Arc<dyn ChatResponder>,
    responder_pool: Arc<Semaphore>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<SessionRegistry>, responder: Arc<dyn ChatResponder>, workers: usize) -> Self {
        Self { registry, responder, responder_pool: Arc::new(Semaphore::new(workers.max(1))) }
    }

    /// Deliver `command` to the session. Never blocks on the responder.
    pub fn dispatch(&self, session_id: SessionId, command: Command) -> Result<Dispatched, LiveTalkError> {
        let Some(renderer) = self.registry.lookup(session_id) else {
            warn!(session_id = %session_id, command = command.name(), "Session not found");
            return Err(LiveTalkError::SessionNotFound(session_id));
        };
        SessionEventLogger::log(
            Some(session_id),
            SessionEvent::Command { kind: command.name().to_string(), text: command.text() },
        );

        match command {
            Command::Interrupt => {
                info!(session_id = %session_id, "Interrupting session");
                renderer.flush();
            }
            Command::Echo(text) => renderer.accept_text(text),
            Command::AudioFile(path) => renderer.accept_audio_file(path),
            Command::SetPlaybackState(state) => renderer.set_playback_state(state),
            Command::Chat(text) => return Ok(Dispatched::Deferred(self.spawn_chat(session_id, text))),
        }
        Ok(Dispatched::Delivered)
    }

    fn spawn_chat(&self, session_id: SessionId, text: String) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let responder = Arc::clone(&self.responder);
        let pool = Arc::clone(&self.responder_pool);
        tokio::spawn(async move {
            let Ok(_permit) = pool.acquire_owned().await else {
                return;
            };
            let reply = match responder.respond(&text).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(session_id = %session_id, responder = responder.name(), error = %e, "Chat responder failed");
                    return;
                }
            };
            // The session may have ended while the responder was running.
            match registry.lookup(session_id) {
                Some(renderer) => renderer.accept_text(reply),
                None => debug!(session_id = %session_id, "Session gone before chat reply"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::EchoResponder;
    use crate::test_support::CountingRenderer;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn setup(responder: Arc<dyn ChatResponder>) -> (Arc<SessionRegistry>, Arc<CountingRenderer>, CommandDispatcher) {
        let reg = Arc::new(SessionRegistry::new());
        let renderer = CountingRenderer::new();
        reg.reserve_pending(SessionId(1)).unwrap();
        reg.attach_renderer(SessionId(1), renderer.clone()).unwrap();
        let dispatcher = CommandDispatcher::new(Arc::clone(&reg), responder, 2);
        (reg, renderer, dispatcher)
    }

    #[tokio::test]
    async fn unknown_or_unattached_session_is_soft_error() {
        let (reg, _r, d) = setup(Arc::new(EchoResponder::default()));
        assert!(matches!(d.dispatch(SessionId(2), Command::Interrupt), Err(LiveTalkError::SessionNotFound(_))));
        reg.reserve_pending(SessionId(3)).unwrap();
        assert!(matches!(
            d.dispatch(SessionId(3), Command::Echo("hi".into())),
            Err(LiveTalkError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn direct_commands_reach_renderer() {
        let (_reg, r, d) = setup(Arc::new(EchoResponder::default()));
        d.dispatch(SessionId(1), Command::Echo("你好".into())).unwrap();
        d.dispatch(SessionId(1), Command::Interrupt).unwrap();
        d.dispatch(SessionId(1), Command::AudioFile("/tmp/audio/a.wav".into())).unwrap();
        d.dispatch(SessionId(1), Command::SetPlaybackState(PlaybackState(2))).unwrap();
        assert_eq!(*r.texts.lock(), vec!["你好".to_string()]);
        assert_eq!(r.flush_count(), 1);
        assert_eq!(r.audio_files.lock().len(), 1);
        assert_eq!(*r.playback.lock(), vec![PlaybackState(2)]);
    }

    #[tokio::test]
    async fn chat_reply_is_delivered_later() {
        let (_reg, r, d) = setup(Arc::new(EchoResponder::new("收到: ")));
        match d.dispatch(SessionId(1), Command::Chat("天气".into())).unwrap() {
            Dispatched::Deferred(handle) => handle.await.unwrap(),
            Dispatched::Delivered => panic!("chat must be deferred"),
        }
        assert_eq!(*r.texts.lock(), vec!["收到: 天气".to_string()]);
    }

    struct GatedResponder(Arc<Notify>);

    #[async_trait]
    impl ChatResponder for GatedResponder {
        fn name(&self) -> &str {
            "gated"
        }

        async fn respond(&self, message: &str) -> anyhow::Result<String> {
            self.0.notified().await;
            Ok(message.to_uppercase())
        }
    }

    #[tokio::test]
    async fn chat_reply_dropped_when_session_ends() {
        let gate = Arc::new(Notify::new());
        let (reg, r, d) = setup(Arc::new(GatedResponder(Arc::clone(&gate))));
        let Dispatched::Deferred(handle) = d.dispatch(SessionId(1), Command::Chat("hi".into())).unwrap() else {
            panic!("chat must be deferred");
        };
        reg.begin_teardown(SessionId(1));
        reg.remove(SessionId(1));
        gate.notify_one();
        handle.await.unwrap();
        assert!(r.texts.lock().is_empty());
    }
}
