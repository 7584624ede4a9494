//! Renderer construction on the blocking pool.

use std::sync::Arc;

use livetalk_core::{LiveTalkError, ModelKind, Renderer, SessionId, TtsProvider};
use livetalk_render::{build_renderer, SharedAssets};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::debug;

/// Everything a constructor needs to build one session's renderer.
pub struct BuildRequest {
    pub session_id: SessionId,
    pub kind: ModelKind,
    pub assets: Arc<SharedAssets>,
    pub tts: Arc<dyn TtsProvider>,
    /// Runtime the renderer spawns its synthesis task on.
    pub runtime: Handle,
}

/// Blocking renderer construction.
pub trait RendererConstructor: Send + Sync {
    fn construct(&self, request: BuildRequest) -> Result<Arc<dyn Renderer>, LiveTalkError>;
}

pub struct StandardConstructor;

impl RendererConstructor for StandardConstructor {
    fn construct(&self, req: BuildRequest) -> Result<Arc<dyn Renderer>, LiveTalkError> {
        build_renderer(req.kind, req.session_id, req.assets, req.tts, &req.runtime)
    }
}

/// Builds renderers of the one model kind chosen at startup, at most
/// `workers` at a time, never on the async executor threads.
pub struct RendererFactory {
    kind: ModelKind,
    assets: Arc<SharedAssets>,
    tts: Arc<dyn TtsProvider>,
    constructor: Arc<dyn RendererConstructor>,
    workers: Arc<Semaphore>,
}

impl RendererFactory {
    /// Fails with `UnknownModelKind` for a selector outside the three models.
    pub fn new(
        model: &str,
        assets: Arc<SharedAssets>,
        tts: Arc<dyn TtsProvider>,
        workers: usize,
    ) -> Result<Self, LiveTalkError> {
        let kind: ModelKind = model.parse()?;
        if assets.kind() != kind {
            return Err(LiveTalkError::Config(format!(
                "model '{kind}' selected but assets were loaded for '{}'",
                assets.kind()
            )));
        }
        Ok(Self {
            kind,
            assets,
            tts,
            constructor: Arc::new(StandardConstructor),
            workers: Arc::new(Semaphore::new(workers.max(1))),
        })
    }

    pub fn with_constructor(mut self, constructor: Arc<dyn RendererConstructor>) -> Self {
        self.constructor = constructor;
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub async fn build(&self, session_id: SessionId) -> Result<Arc<dyn Renderer>, LiveTalkError> {
        let _permit = self.workers.acquire().await.map_err(|_| LiveTalkError::RendererBuildFailure {
            session_id,
            reason: "build pool shut down".into(),
        })?;
        debug!(session_id = %session_id, model = %self.kind, "Building renderer");

        let request = BuildRequest {
            session_id,
            kind: self.kind,
            assets: Arc::clone(&self.assets),
            tts: Arc::clone(&self.tts),
            runtime: Handle::current(),
        };
        let constructor = Arc::clone(&self.constructor);
        tokio::task::spawn_blocking(move || constructor.construct(request))
            .await
            .map_err(|e| LiveTalkError::RendererBuildFailure {
                session_id,
                reason: format!("build task failed: {e}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetalk_render::Avatar;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn assets(kind: ModelKind) -> Arc<SharedAssets> {
        Arc::new(SharedAssets::new(kind, Avatar::synthetic("t", 3, 450, 450), 50, 16))
    }

    fn tts() -> Arc<dyn TtsProvider> {
        Arc::new(livetalk_tts::SilentTts::new())
    }

    #[test]
    fn unknown_model_kind() {
        let err = RendererFactory::new("ernerf", assets(ModelKind::MuseTalk), tts(), 1).err().unwrap();
        assert!(matches!(err, LiveTalkError::UnknownModelKind(_)));
    }

    #[test]
    fn assets_must_match_model() {
        let err = RendererFactory::new("wav2lip", assets(ModelKind::MuseTalk), tts(), 1).err().unwrap();
        assert!(matches!(err, LiveTalkError::Config(_)));
    }

    #[tokio::test]
    async fn builds_selected_model() {
        let factory = RendererFactory::new("ultralight", assets(ModelKind::UltraLight), tts(), 2).unwrap();
        let renderer = factory.build(SessionId(42)).await.unwrap();
        assert_eq!(renderer.kind(), ModelKind::UltraLight);
        renderer.release();
    }

    struct SlowConstructor {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RendererConstructor for SlowConstructor {
        fn construct(&self, req: BuildRequest) -> Result<Arc<dyn Renderer>, LiveTalkError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Err(LiveTalkError::RendererBuildFailure { session_id: req.session_id, reason: "no gpu".into() })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pool_bounds_concurrent_builds() {
        let slow = Arc::new(SlowConstructor { active: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
        let factory = Arc::new(
            RendererFactory::new("musetalk", assets(ModelKind::MuseTalk), tts(), 2)
                .unwrap()
                .with_constructor(slow.clone()),
        );
        let builds: Vec<_> = (0..6u64)
            .map(|i| {
                let factory = Arc::clone(&factory);
                tokio::spawn(async move { factory.build(SessionId(i)).await })
            })
            .collect();
        for b in builds {
            assert!(matches!(b.await.unwrap(), Err(LiveTalkError::RendererBuildFailure { .. })));
        }
        assert!(slow.peak.load(Ordering::SeqCst) <= 2);
    }
}
