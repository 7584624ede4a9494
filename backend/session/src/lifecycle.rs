//! Session teardown. The single authority that removes sessions from the
//! registry.

use std::sync::Arc;

use livetalk_core::SessionId;
use livetalk_logging::{SessionEvent, SessionEventLogger};
use tracing::{debug, info, instrument};

use crate::registry::SessionRegistry;

pub struct SessionLifecycle {
    registry: Arc<SessionRegistry>,
}

impl SessionLifecycle {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Close the connection, release the renderer, remove the entry.
    ///
    /// Returns `false` without side effects when the session is absent or
    /// another caller is already tearing it down. Each step tolerates the
    /// resource of the previous one being gone.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn cleanup(&self, session_id: SessionId, reason: &str) -> bool {
        let Some(teardown) = self.registry.begin_teardown(session_id) else {
            debug!("Cleanup skipped; session already gone");
            return false;
        };

        if let Some(connection) = teardown.connection {
            connection.close().await;
        }
        if let Some(renderer) = teardown.renderer {
            renderer.release();
        }
        self.registry.remove(session_id);

        info!(previous = %teardown.previous, reason, remaining = self.registry.count(), "Session cleaned up");
        SessionEventLogger::log(Some(session_id), SessionEvent::CleanedUp { reason: reason.to_string() });
        true
    }

    /// Clean up every registered session. Returns how many were torn down.
    pub async fn shutdown_all(&self) -> usize {
        let ids = self.registry.ids();
        let mut cleaned = 0;
        for id in ids {
            if self.cleanup(id, "shutdown").await {
                cleaned += 1;
            }
        }
        cleaned
    }
}
