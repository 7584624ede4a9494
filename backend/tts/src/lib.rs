pub mod engine;
pub mod wav;

pub use engine::{create_tts, IndexTts, SilentTts, TtsProviderKind};
pub use livetalk_core::TtsProvider;
pub use wav::{decode_wav, read_wav_file};
