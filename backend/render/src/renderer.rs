//! The three renderer variants.
//!
//! Each variant shares the same frame scheduling and speech pipeline and
//! differs in its model profile. Video frames reference avatar frame
//! indices: idle playback ping-pongs through the loop, talking plays it
//! forward so the mouth region is re-rendered on fresh frames.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use livetalk_core::{
    AudioFrame, LiveTalkError, ModelKind, PlaybackState, Renderer, SessionId, TtsProvider,
    VideoFrame,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::assets::{ModelProfile, SharedAssets};
use crate::speech::SpeechPipeline;

/// Compile-time model selection for [`ModelRenderer`].
pub trait RenderVariant: Send + Sync + 'static {
    const KIND: ModelKind;

    fn profile() -> ModelProfile {
        ModelProfile::for_kind(Self::KIND)
    }
}

pub struct LipSync;
pub struct MuseTalk;
pub struct UltraLight;

impl RenderVariant for LipSync {
    const KIND: ModelKind = ModelKind::LipSync;
}

impl RenderVariant for MuseTalk {
    const KIND: ModelKind = ModelKind::MuseTalk;
}

impl RenderVariant for UltraLight {
    const KIND: ModelKind = ModelKind::UltraLight;
}

pub type LipSyncRenderer = ModelRenderer<LipSync>;
pub type MuseTalkRenderer = ModelRenderer<MuseTalk>;
pub type UltraLightRenderer = ModelRenderer<UltraLight>;

#[derive(Debug, Default)]
struct LoopCursor {
    index: usize,
    reverse: bool,
}

impl LoopCursor {
    /// Ping-pong over `0..len`: 0,1,..,len-1,len-2,..,1,0,1,..
    fn mirror_step(&mut self, len: usize) -> usize {
        if len <= 1 {
            self.index = 0;
            return 0;
        }
        let current = self.index.min(len - 1);
        if self.reverse {
            if current == 0 {
                self.reverse = false;
                self.index = 1;
            } else {
                self.index = current - 1;
            }
        } else if current + 1 >= len {
            self.reverse = true;
            self.index = current - 1;
        } else {
            self.index = current + 1;
        }
        current
    }

    fn forward_step(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let current = self.index % len;
        self.index = (current + 1) % len;
        self.reverse = false;
        current
    }
}

pub struct ModelRenderer<V: RenderVariant> {
    session_id: SessionId,
    profile: ModelProfile,
    assets: Arc<SharedAssets>,
    speech: SpeechPipeline,
    playback: AtomicI32,
    video_pts: AtomicU64,
    cursor: Mutex<LoopCursor>,
    released: AtomicBool,
    _variant: PhantomData<V>,
}

impl<V: RenderVariant> ModelRenderer<V> {
    pub fn new(
        session_id: SessionId,
        assets: Arc<SharedAssets>,
        tts: Arc<dyn TtsProvider>,
        runtime: &Handle,
    ) -> Result<Self, LiveTalkError> {
        if assets.kind() != V::KIND {
            return Err(LiveTalkError::RendererBuildFailure {
                session_id,
                reason: format!("assets were loaded for {}, not {}", assets.kind(), V::KIND),
            });
        }
        if assets.avatar.frame_count() == 0 {
            return Err(LiveTalkError::RendererBuildFailure {
                session_id,
                reason: format!("avatar '{}' has no frames", assets.avatar.id),
            });
        }
        let speech = SpeechPipeline::start(session_id, tts, runtime);
        Ok(Self {
            session_id,
            profile: V::profile(),
            assets,
            speech,
            playback: AtomicI32::new(PlaybackState::IDLE.0),
            video_pts: AtomicU64::new(0),
            cursor: Mutex::new(LoopCursor::default()),
            released: AtomicBool::new(false),
            _variant: PhantomData,
        })
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState(self.playback.load(Ordering::Relaxed))
    }

    fn next_avatar_index(&self, talking: bool) -> usize {
        let avatar = &self.assets.avatar;
        let custom = avatar.custom_frame_count();
        let mut cursor = self.cursor.lock();
        if talking {
            cursor.forward_step(avatar.frame_count())
        } else if !self.playback_state().is_idle() && custom > 0 {
            // Custom loop frames follow the base frames in index space.
            avatar.frame_count() + cursor.mirror_step(custom)
        } else {
            cursor.mirror_step(avatar.frame_count())
        }
    }
}

impl<V: RenderVariant> Renderer for ModelRenderer<V> {
    fn kind(&self) -> ModelKind {
        V::KIND
    }

    fn produce_audio_frame(&self) -> AudioFrame {
        self.speech.next_frame()
    }

    fn produce_video_frame(&self) -> VideoFrame {
        let talking = self.speech.is_speaking();
        let avatar_index = self.next_avatar_index(talking);
        VideoFrame {
            avatar_index,
            width: self.assets.avatar.width,
            height: self.assets.avatar.height,
            pts: self.video_pts.fetch_add(1, Ordering::Relaxed),
            talking,
            model: V::KIND,
            face_size: self.profile.face_size,
        }
    }

    fn accept_text(&self, text: String) {
        if self.is_released() {
            return;
        }
        self.speech.enqueue_text(text);
    }

    fn accept_audio_file(&self, path: PathBuf) {
        if self.is_released() {
            return;
        }
        self.speech.enqueue_audio_file(path);
    }

    fn flush(&self) {
        self.speech.flush();
    }

    fn set_playback_state(&self, state: PlaybackState) {
        debug!(session_id = %self.session_id, audiotype = state.0, "Playback state");
        self.playback.store(state.0, Ordering::Relaxed);
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.speech.release();
        info!(session_id = %self.session_id, model = %V::KIND, "Renderer released");
    }
}

/// Build the renderer variant for `kind`. Blocking; run it off the control plane.
pub fn build_renderer(
    kind: ModelKind,
    session_id: SessionId,
    assets: Arc<SharedAssets>,
    tts: Arc<dyn TtsProvider>,
    runtime: &Handle,
) -> Result<Arc<dyn Renderer>, LiveTalkError> {
    let renderer: Arc<dyn Renderer> = match kind {
        ModelKind::LipSync => Arc::new(LipSyncRenderer::new(session_id, assets, tts, runtime)?),
        ModelKind::MuseTalk => Arc::new(MuseTalkRenderer::new(session_id, assets, tts, runtime)?),
        ModelKind::UltraLight => {
            Arc::new(UltraLightRenderer::new(session_id, assets, tts, runtime)?)
        }
    };
    info!(session_id = %session_id, model = %kind, "Renderer built");
    Ok(renderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Avatar;
    use async_trait::async_trait;
    use livetalk_core::PcmAudio;
    use std::time::Duration;

    struct BeepTts;

    #[async_trait]
    impl TtsProvider for BeepTts {
        fn name(&self) -> &str {
            "beep"
        }

        async fn synthesize(&self, _text: &str) -> anyhow::Result<PcmAudio> {
            Ok(PcmAudio::new(vec![300; 640], 16_000))
        }
    }

    fn assets(kind: ModelKind, frames: usize) -> Arc<SharedAssets> {
        Arc::new(SharedAssets::new(kind, Avatar::synthetic("test", frames, 450, 450), 50, 16))
    }

    #[test]
    fn mirror_loop_ping_pongs() {
        let mut c = LoopCursor::default();
        let seq: Vec<usize> = (0..8).map(|_| c.mirror_step(4)).collect();
        assert_eq!(seq, vec![0, 1, 2, 3, 2, 1, 0, 1]);
    }

    #[test]
    fn forward_loop_wraps() {
        let mut c = LoopCursor::default();
        let seq: Vec<usize> = (0..5).map(|_| c.forward_step(3)).collect();
        assert_eq!(seq, vec![0, 1, 2, 0, 1]);
    }

    #[tokio::test]
    async fn builds_each_variant() {
        for kind in ModelKind::ALL {
            let r = build_renderer(kind, SessionId(7), assets(kind, 4), Arc::new(BeepTts), &Handle::current())
                .unwrap();
            assert_eq!(r.kind(), kind);
            let frame = r.produce_video_frame();
            assert_eq!(frame.model, kind);
            assert_eq!(frame.face_size, ModelProfile::for_kind(kind).face_size);
            r.release();
        }
    }

    #[tokio::test]
    async fn mismatched_assets_fail_to_build() {
        let res = build_renderer(
            ModelKind::LipSync,
            SessionId(7),
            assets(ModelKind::MuseTalk, 4),
            Arc::new(BeepTts),
            &Handle::current(),
        );
        assert!(matches!(res, Err(LiveTalkError::RendererBuildFailure { .. })));
    }

    #[tokio::test]
    async fn talking_flag_follows_speech() {
        let r = MuseTalkRenderer::new(SessionId(1), assets(ModelKind::MuseTalk, 3), Arc::new(BeepTts), &Handle::current())
            .unwrap();
        assert!(!r.produce_video_frame().talking);
        r.accept_text("hello".into());
        for _ in 0..100 {
            if r.speech.is_speaking() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(r.produce_video_frame().talking);
        r.produce_audio_frame();
        r.produce_audio_frame();
        assert!(!r.produce_video_frame().talking);
    }

    #[tokio::test]
    async fn interrupt_when_idle_and_double_release_are_safe() {
        let r = UltraLightRenderer::new(SessionId(1), assets(ModelKind::UltraLight, 2), Arc::new(BeepTts), &Handle::current())
            .unwrap();
        r.flush();
        r.flush();
        r.release();
        r.release();
        assert!(r.is_released());
        r.accept_text("ignored".into());
        assert!(r.produce_audio_frame().silent);
    }

    #[tokio::test]
    async fn playback_state_is_recorded() {
        let r = LipSyncRenderer::new(SessionId(1), assets(ModelKind::LipSync, 2), Arc::new(BeepTts), &Handle::current())
            .unwrap();
        r.set_playback_state(PlaybackState(1));
        assert_eq!(r.playback_state(), PlaybackState(1));
    }
}
