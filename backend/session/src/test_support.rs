//! Fakes shared by the in-crate tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use livetalk_core::{AudioFrame, ModelKind, PlaybackState, Renderer, VideoFrame};
use parking_lot::Mutex;

/// Records every call it receives.
#[derive(Default)]
pub struct CountingRenderer {
    pub texts: Mutex<Vec<String>>,
    pub audio_files: Mutex<Vec<PathBuf>>,
    pub playback: Mutex<Vec<PlaybackState>>,
    pub flushes: AtomicUsize,
    pub releases: AtomicUsize,
}

impl CountingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Renderer for CountingRenderer {
    fn kind(&self) -> ModelKind {
        ModelKind::MuseTalk
    }

    fn produce_audio_frame(&self) -> AudioFrame {
        AudioFrame { samples: vec![0; 320], sample_rate: 16_000, pts: 0, silent: true }
    }

    fn produce_video_frame(&self) -> VideoFrame {
        VideoFrame {
            avatar_index: 0,
            width: 450,
            height: 450,
            pts: 0,
            talking: false,
            model: ModelKind::MuseTalk,
            face_size: 256,
        }
    }

    fn accept_text(&self, text: String) {
        self.texts.lock().push(text);
    }

    fn accept_audio_file(&self, path: PathBuf) {
        self.audio_files.lock().push(path);
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn set_playback_state(&self, state: PlaybackState) {
        self.playback.lock().push(state);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
