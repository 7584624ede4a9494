//! Per-session renderers for the three avatar models.
//!
//! Model weights and avatar frames are loaded once per process into
//! [`SharedAssets`] and shared read-only by every renderer.

pub mod assets;
pub mod player;
pub mod renderer;
pub mod speech;

pub use assets::{AssetOptions, Avatar, ModelProfile, SharedAssets, SharedModel};
pub use player::{AudioTrack, HumanPlayer, VideoTrack};
pub use renderer::{
    build_renderer, LipSync, LipSyncRenderer, ModelRenderer, MuseTalk, MuseTalkRenderer,
    RenderVariant, UltraLight, UltraLightRenderer,
};
pub use speech::{SpeechPipeline, OUTPUT_SAMPLE_RATE};
