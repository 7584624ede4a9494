//! Frame and codec types shared between renderers and the transport.

use serde::{Deserialize, Serialize};

use crate::types::ModelKind;

/// Output frames per second on the audio path (20 ms frames).
pub const AUDIO_FRAMES_PER_SECOND: u32 = 50;

/// Which media section a track or codec belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// Decoded mono PCM.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / u64::from(self.sample_rate)
    }

    /// Linear resample to `target_rate`. Identity when rates match.
    pub fn resampled(self, target_rate: u32) -> PcmAudio {
        if self.sample_rate == target_rate || self.sample_rate == 0 || self.samples.is_empty() {
            return PcmAudio { sample_rate: target_rate, ..self };
        }
        let ratio = f64::from(self.sample_rate) / f64::from(target_rate);
        let out_len = (self.samples.len() as f64 / ratio).floor() as usize;
        let last = self.samples.len() - 1;
        let samples = (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = pos.floor() as usize;
                let frac = pos - idx as f64;
                let a = f64::from(self.samples[idx.min(last)]);
                let b = f64::from(self.samples[(idx + 1).min(last)]);
                (a + (b - a) * frac).round() as i16
            })
            .collect();
        PcmAudio { samples, sample_rate: target_rate }
    }
}

/// One 20 ms audio frame pulled by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Presentation timestamp in samples.
    pub pts: u64,
    /// True when the frame is padding because nothing was queued.
    pub silent: bool,
}

/// One video frame pulled by the transport.
///
/// Pixel data stays with the avatar assets; the frame carries the avatar
/// frame index the encoder should emit and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub avatar_index: usize,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in frames.
    pub pts: u64,
    pub talking: bool,
    pub model: ModelKind,
    /// Side length of the face crop the model re-renders.
    pub face_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaFrame {
    Audio(AudioFrame),
    Video(VideoFrame),
}

/// A codec the transport can negotiate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCapability {
    pub mime_type: String,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_fmtp_line: Option<String>,
}

impl CodecCapability {
    pub fn new(mime_type: impl Into<String>, clock_rate: u32) -> Self {
        Self { mime_type: mime_type.into(), clock_rate, sdp_fmtp_line: None }
    }

    pub fn with_fmtp(mut self, line: impl Into<String>) -> Self {
        self.sdp_fmtp_line = Some(line.into());
        self
    }

    /// Codec name without the `video/` or `audio/` prefix.
    pub fn name(&self) -> &str {
        self.mime_type.split_once('/').map(|(_, n)| n).unwrap_or(&self.mime_type)
    }
}
