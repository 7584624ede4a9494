//! Admission control under the concurrent session cap.

use std::sync::Arc;

use livetalk_core::{LiveTalkError, SessionId};
use livetalk_logging::{SessionEvent, SessionEventLogger};
use rand::Rng;
use tracing::warn;

use crate::registry::SessionRegistry;

/// Uniform random id with exactly `digits` decimal digits.
pub fn random_session_id(digits: u32) -> SessionId {
    let low = 10u64.pow(digits.saturating_sub(1));
    let high = 10u64.pow(digits);
    SessionId(rand::thread_rng().gen_range(low..high))
}

pub struct AdmissionController {
    registry: Arc<SessionRegistry>,
    max_sessions: usize,
    id_digits: u32,
    id_retries: u32,
}

impl AdmissionController {
    pub fn new(registry: Arc<SessionRegistry>, max_sessions: usize, id_digits: u32, id_retries: u32) -> Self {
        Self { registry, max_sessions, id_digits, id_retries }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Reserve a pending slot under a fresh id, or reject without touching
    /// the registry.
    pub fn try_admit(&self) -> Result<SessionId, LiveTalkError> {
        let digits = self.id_digits;
        self.try_admit_with(|| random_session_id(digits))
    }

    pub fn try_admit_with(&self, next_id: impl FnMut() -> SessionId) -> Result<SessionId, LiveTalkError> {
        match self.registry.reserve_bounded(self.max_sessions, self.id_retries, next_id) {
            Ok(id) => {
                SessionEventLogger::log(
                    Some(id),
                    SessionEvent::Admitted { active: self.registry.count(), max: self.max_sessions },
                );
                Ok(id)
            }
            Err(e) => {
                if matches!(e, LiveTalkError::AdmissionRejected) {
                    warn!(max = self.max_sessions, "Reached max session limit");
                    SessionEventLogger::log(
                        None,
                        SessionEvent::Rejected { active: self.registry.count(), max: self.max_sessions },
                    );
                } else {
                    warn!(error = %e, "Could not allocate a session id");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_requested_width() {
        for _ in 0..200 {
            let id = random_session_id(6).0;
            assert!((100_000..1_000_000).contains(&id), "{id}");
        }
    }

    #[test]
    fn rejection_leaves_registry_untouched() {
        let reg = Arc::new(SessionRegistry::new());
        let admission = AdmissionController::new(Arc::clone(&reg), 1, 6, 8);
        let first = admission.try_admit().unwrap();
        let err = admission.try_admit().unwrap_err();
        assert_eq!(err.to_string(), "reach max session");
        assert_eq!(reg.ids(), vec![first]);
    }

    #[test]
    fn slot_frees_after_removal() {
        let reg = Arc::new(SessionRegistry::new());
        let admission = AdmissionController::new(Arc::clone(&reg), 1, 6, 8);
        let a = admission.try_admit().unwrap();
        assert!(reg.remove(a));
        assert!(admission.try_admit().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_respect_cap() {
        let reg = Arc::new(SessionRegistry::new());
        let admission = Arc::new(AdmissionController::new(Arc::clone(&reg), 3, 6, 8));
        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let admission = Arc::clone(&admission);
                tokio::spawn(async move { admission.try_admit().is_ok() })
            })
            .collect();
        let mut admitted = 0;
        for t in tasks {
            if t.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
        assert_eq!(reg.count(), 3);
    }
}
