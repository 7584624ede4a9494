//! Durable storage for audio uploaded to a session.
//!
//! Files land at `{upload_dir}/audio_{sessionid}_{filename}`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use livetalk_core::SessionId;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::mime_detect::{detect_mime_type, has_wav_header, is_audio, is_playable_audio};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("unsupported audio type {mime} for {name}")]
    NotAudio { name: String, mime: &'static str },

    /// Audio, but not a format the speech pipeline can play.
    #[error("unsupported audio format {mime} for {name}; upload a WAV file")]
    Unplayable { name: String, mime: &'static str },

    #[error("empty upload")]
    Empty,

    #[error("failed to store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the upload and return where it was stored.
    pub async fn store(
        &self,
        session_id: SessionId,
        filename: &str,
        data: Bytes,
    ) -> Result<PathBuf, StoreError> {
        let name = sanitize(filename)?;
        let mime = detect_mime_type(Path::new(name));
        if !is_audio(mime) {
            return Err(StoreError::NotAudio { name: name.to_string(), mime });
        }
        if data.is_empty() {
            return Err(StoreError::Empty);
        }
        if !is_playable_audio(mime) || !has_wav_header(&data) {
            warn!(session_id = %session_id, name = %name, mime, "Rejected unplayable audio upload");
            return Err(StoreError::Unplayable { name: name.to_string(), mime });
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;

        let path = self.dir.join(format!("audio_{session_id}_{name}"));
        fs::write(&path, &data)
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;

        info!(session_id = %session_id, path = %path.display(), bytes = data.len(), "Stored audio upload");
        Ok(path)
    }
}

fn sanitize(filename: &str) -> Result<&str, StoreError> {
    let name = filename.trim();
    if name.is_empty()
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        warn!(filename = %filename, "Rejected suspicious upload name");
        return Err(StoreError::InvalidName(filename.to_string()));
    }
    Ok(name)
}
