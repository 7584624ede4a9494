//! Process-wide model and avatar assets.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use livetalk_core::ModelKind;
use serde::Serialize;
use tracing::info;

/// Fixed inference parameters of a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelProfile {
    pub kind: ModelKind,
    /// Side length of the face crop the network re-renders.
    pub face_size: u32,
    /// Audio feature frames of context taken on each side of a video frame.
    pub feature_window: usize,
    pub feature_extractor: &'static str,
}

impl ModelProfile {
    pub const fn for_kind(kind: ModelKind) -> Self {
        match kind {
            ModelKind::LipSync => Self {
                kind,
                face_size: 96,
                feature_window: 16,
                feature_extractor: "mel",
            },
            ModelKind::MuseTalk => Self {
                kind,
                face_size: 256,
                feature_window: 2,
                feature_extractor: "whisper",
            },
            ModelKind::UltraLight => Self {
                kind,
                face_size: 160,
                feature_window: 8,
                feature_extractor: "hubert",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedModel {
    pub profile: ModelProfile,
    pub batch_size: u32,
    pub fps: u32,
}

/// Full-frame avatar images, sorted by frame number.
#[derive(Debug, Clone)]
pub struct Avatar {
    pub id: String,
    pub width: u32,
    pub height: u32,
    frames: Vec<PathBuf>,
    /// Alternate loop played for non-idle playback states, when present.
    custom_frames: Vec<PathBuf>,
}

impl Avatar {
    /// Load `{root}/{id}/full_imgs/*.{png,jpg}` and the optional
    /// `{root}/{id}/custom_imgs` loop.
    pub fn load(root: &Path, id: &str, width: u32, height: u32) -> Result<Self> {
        let dir = root.join(id);
        let frames = list_images(&dir.join("full_imgs"))
            .with_context(|| format!("Avatar '{id}' not found under {}", root.display()))?;
        if frames.is_empty() {
            bail!("Avatar '{id}' has no frames in {}", dir.join("full_imgs").display());
        }
        let custom_dir = dir.join("custom_imgs");
        let custom_frames = if custom_dir.is_dir() { list_images(&custom_dir)? } else { Vec::new() };
        Ok(Self { id: id.to_string(), width, height, frames, custom_frames })
    }

    /// An in-memory avatar with `frame_count` placeholder frames.
    pub fn synthetic(id: &str, frame_count: usize, width: u32, height: u32) -> Self {
        let frames = (0..frame_count).map(|i| PathBuf::from(format!("{i:08}.png"))).collect();
        Self { id: id.to_string(), width, height, frames, custom_frames: Vec::new() }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn custom_frame_count(&self) -> usize {
        self.custom_frames.len()
    }

    pub fn frame_path(&self, index: usize) -> Option<&Path> {
        self.frames.get(index).map(PathBuf::as_path)
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        })
        .collect();
    images.sort();
    Ok(images)
}

pub struct AssetOptions<'a> {
    pub kind: ModelKind,
    pub avatar_root: &'a Path,
    pub avatar_id: &'a str,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub batch_size: u32,
}

/// Loaded once at startup, immutable afterwards.
#[derive(Debug)]
pub struct SharedAssets {
    pub model: SharedModel,
    pub avatar: Avatar,
}

impl SharedAssets {
    pub fn load(opts: AssetOptions<'_>) -> Result<Arc<Self>> {
        let avatar = Avatar::load(opts.avatar_root, opts.avatar_id, opts.width, opts.height)?;
        info!(
            model = %opts.kind,
            avatar = %avatar.id,
            frames = avatar.frame_count(),
            "Loaded model assets"
        );
        Ok(Arc::new(Self::new(opts.kind, avatar, opts.fps, opts.batch_size)))
    }

    pub fn new(kind: ModelKind, avatar: Avatar, fps: u32, batch_size: u32) -> Self {
        Self {
            model: SharedModel { profile: ModelProfile::for_kind(kind), batch_size, fps },
            avatar,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.model.profile.kind
    }
}
