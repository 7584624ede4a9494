//! Session registry: the only process-wide mutable session state.
//!
//! Every operation takes the same lock, so reservation, attachment and
//! teardown of one id never interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use livetalk_core::{LiveTalkError, PeerTransport, Renderer, SessionId, SessionState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("session id {0} is already registered")]
    Collision(SessionId),

    /// Absent, or already being torn down.
    #[error("session {0} not found")]
    NotFound(SessionId),
}

impl From<RegistryError> for LiveTalkError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Collision(_) => LiveTalkError::SessionCollision { attempts: 1 },
            RegistryError::NotFound(id) => LiveTalkError::SessionNotFound(id),
        }
    }
}

struct SessionEntry {
    state: SessionState,
    renderer: Option<Arc<dyn Renderer>>,
    connection: Option<Arc<dyn PeerTransport>>,
    created_at: Instant,
}

impl SessionEntry {
    fn pending() -> Self {
        Self {
            state: SessionState::Pending,
            renderer: None,
            connection: None,
            created_at: Instant::now(),
        }
    }

    fn is_live(&self) -> bool {
        self.state != SessionState::Closed
    }
}

/// Handles taken out of an entry by [`SessionRegistry::begin_teardown`].
pub struct Teardown {
    pub previous: SessionState,
    pub renderer: Option<Arc<dyn Renderer>>,
    pub connection: Option<Arc<dyn PeerTransport>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(rename = "sessionid")]
    pub session_id: SessionId,
    pub state: SessionState,
    pub age_secs: u64,
    pub renderer_attached: bool,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a placeholder entry with no renderer.
    pub fn reserve_pending(&self, id: SessionId) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&id) {
            return Err(RegistryError::Collision(id));
        }
        sessions.insert(id, SessionEntry::pending());
        Ok(())
    }

    /// Check the cap and reserve a fresh id in one critical section.
    ///
    /// `next_id` is drawn up to `attempts` times until it yields an id that
    /// is not currently registered.
    pub fn reserve_bounded(
        &self,
        max_sessions: usize,
        attempts: u32,
        mut next_id: impl FnMut() -> SessionId,
    ) -> Result<SessionId, LiveTalkError> {
        let mut sessions = self.sessions.lock();
        if sessions.len() >= max_sessions {
            return Err(LiveTalkError::AdmissionRejected);
        }
        for _ in 0..attempts.max(1) {
            let id = next_id();
            if !sessions.contains_key(&id) {
                sessions.insert(id, SessionEntry::pending());
                return Ok(id);
            }
        }
        Err(LiveTalkError::SessionCollision { attempts: attempts.max(1) })
    }

    pub fn attach_renderer(&self, id: SessionId, renderer: Arc<dyn Renderer>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&id) {
            Some(entry) if entry.is_live() => {
                entry.renderer = Some(renderer);
                Ok(())
            }
            _ => Err(RegistryError::NotFound(id)),
        }
    }

    pub fn attach_connection(
        &self,
        id: SessionId,
        connection: Arc<dyn PeerTransport>,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&id) {
            Some(entry) if entry.is_live() => {
                entry.connection = Some(connection);
                Ok(())
            }
            _ => Err(RegistryError::NotFound(id)),
        }
    }

    /// Move a live session to `state`, returning the previous one. `Closed`
    /// is only entered through [`begin_teardown`](Self::begin_teardown).
    pub fn set_state(&self, id: SessionId, state: SessionState) -> Result<SessionState, RegistryError> {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&id) {
            Some(entry) if entry.is_live() && state != SessionState::Closed => {
                Ok(std::mem::replace(&mut entry.state, state))
            }
            _ => Err(RegistryError::NotFound(id)),
        }
    }

    /// The renderer of a live session, once attached.
    pub fn lookup(&self, id: SessionId) -> Option<Arc<dyn Renderer>> {
        let sessions = self.sessions.lock();
        sessions.get(&id).filter(|e| e.is_live()).and_then(|e| e.renderer.clone())
    }

    pub fn state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions.lock().get(&id).map(|e| e.state)
    }

    /// Mark the session closed and hand its resources to the caller. Only
    /// the first caller for a given session gets `Some`.
    pub fn begin_teardown(&self, id: SessionId) -> Option<Teardown> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(&id).filter(|e| e.is_live())?;
        let previous = std::mem::replace(&mut entry.state, SessionState::Closed);
        Some(Teardown {
            previous,
            renderer: entry.renderer.take(),
            connection: entry.connection.take(),
        })
    }

    /// Idempotent; `false` when the id was already absent.
    pub fn remove(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    /// Registered sessions, including ones still being torn down.
    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock();
        let mut out: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, e)| SessionSummary {
                session_id: *id,
                state: e.state,
                age_secs: e.created_at.elapsed().as_secs(),
                renderer_attached: e.renderer.is_some(),
            })
            .collect();
        out.sort_by_key(|s| s.session_id);
        out
    }
}
