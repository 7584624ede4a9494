pub mod connection;
pub mod error;
pub mod media;
pub mod traits;
pub mod types;

pub use connection::ConnectionState;
pub use error::{LiveTalkError, Result};
pub use media::{AUDIO_FRAMES_PER_SECOND, AudioFrame, CodecCapability, MediaFrame, MediaKind, PcmAudio, VideoFrame};
pub use traits::{ChatResponder, MediaTrack, PeerTransport, Renderer, TransportFactory, TtsProvider};
pub use types::{ModelKind, PlaybackState, SdpType, SessionDescription, SessionId, SessionState};
