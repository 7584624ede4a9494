//! Storage for uploaded audio clips.

pub mod audio_store;
pub mod mime_detect;

pub use audio_store::{AudioStore, StoreError};
pub use mime_detect::{detect_mime_type, has_wav_header, is_audio, is_playable_audio};
