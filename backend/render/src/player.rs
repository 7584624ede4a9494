//! Pull-based media tracks that feed a renderer's output to the transport.

use std::sync::Arc;

use livetalk_core::{MediaFrame, MediaKind, MediaTrack, Renderer};

pub struct AudioTrack {
    renderer: Arc<dyn Renderer>,
}

impl MediaTrack for AudioTrack {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn next_frame(&self) -> MediaFrame {
        MediaFrame::Audio(self.renderer.produce_audio_frame())
    }
}

pub struct VideoTrack {
    renderer: Arc<dyn Renderer>,
}

impl MediaTrack for VideoTrack {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn next_frame(&self) -> MediaFrame {
        MediaFrame::Video(self.renderer.produce_video_frame())
    }
}

/// The audio and video producers of one session.
pub struct HumanPlayer {
    pub audio: Arc<AudioTrack>,
    pub video: Arc<VideoTrack>,
}

impl HumanPlayer {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            audio: Arc::new(AudioTrack { renderer: Arc::clone(&renderer) }),
            video: Arc::new(VideoTrack { renderer }),
        }
    }

    /// Audio first, then video.
    pub fn tracks(&self) -> [Arc<dyn MediaTrack>; 2] {
        [self.audio.clone(), self.video.clone()]
    }
}
