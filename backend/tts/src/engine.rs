/// TTS provider implementations (IndexTTS HTTP server + offline silence).
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use livetalk_core::{PcmAudio, TtsProvider};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::wav::decode_wav;

// ---------------------------------------------------------------------------
// IndexTTS
// ---------------------------------------------------------------------------

const DEFAULT_VOICE_ID: &str = "default";

/// Client for an IndexTTS server: `POST {server}/tts` answers with a WAV body.
///
/// With a reference voice file the request is sent as multipart form data
/// carrying the sample; otherwise a JSON body naming a preset voice.
pub struct IndexTts {
    server: String,
    voice_id: String,
    ref_file: Option<PathBuf>,
    ref_text: Option<String>,
    client: Client,
}

impl IndexTts {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build TTS HTTP client")?;
        Ok(Self {
            server: server.into().trim_end_matches('/').to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            ref_file: None,
            ref_text: None,
            client,
        })
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_reference(mut self, file: PathBuf, text: Option<String>) -> Self {
        self.ref_file = Some(file);
        self.ref_text = text;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/tts", self.server)
    }

    async fn multipart_form(&self, text: &str, ref_file: &Path) -> Result<Form> {
        let sample = tokio::fs::read(ref_file)
            .await
            .with_context(|| format!("Failed to read reference voice: {}", ref_file.display()))?;
        let file_name = ref_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "voice.wav".to_string());
        let part = Part::bytes(sample).file_name(file_name).mime_str("audio/wav")?;

        let mut form = Form::new()
            .text("text", text.to_string())
            .text("voice_id", self.voice_id.clone())
            .part("voice", part);
        if let Some(ref_text) = &self.ref_text {
            form = form.text("ref_text", ref_text.clone());
        }
        Ok(form)
    }
}

#[derive(Serialize)]
struct IndexTtsBody<'a> {
    text: &'a str,
    voice_id: &'a str,
}

#[async_trait]
impl TtsProvider for IndexTts {
    fn name(&self) -> &str {
        "indextts"
    }

    async fn synthesize(&self, text: &str) -> Result<PcmAudio> {
        info!("[TTS/IndexTTS] Synthesizing {} chars voice_id={}", text.chars().count(), self.voice_id);
        let request = self.client.post(self.endpoint());
        let request = match &self.ref_file {
            Some(file) => request.multipart(self.multipart_form(text, file).await?),
            None => request.json(&IndexTtsBody { text, voice_id: &self.voice_id }),
        };

        let bytes = request
            .send()
            .await
            .with_context(|| format!("TTS server unreachable at {}", self.server))?
            .error_for_status()?
            .bytes()
            .await?;

        let pcm = decode_wav(&bytes)?;
        debug!(ms = pcm.duration_ms(), rate = pcm.sample_rate, "[TTS/IndexTTS] Decoded reply");
        Ok(pcm)
    }
}

// ---------------------------------------------------------------------------
// Silent
// ---------------------------------------------------------------------------

/// Produces silence whose length follows the text length. Keeps the talking
/// animation and frame timing realistic without a TTS server.
pub struct SilentTts {
    sample_rate: u32,
    ms_per_char: u64,
}

impl SilentTts {
    pub fn new() -> Self {
        Self { sample_rate: 16_000, ms_per_char: 200 }
    }
}

impl Default for SilentTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TtsProvider for SilentTts {
    fn name(&self) -> &str {
        "silent"
    }

    async fn synthesize(&self, text: &str) -> Result<PcmAudio> {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count() as u64;
        let len = (chars * self.ms_per_char * u64::from(self.sample_rate) / 1000) as usize;
        Ok(PcmAudio::new(vec![0; len], self.sample_rate))
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub enum TtsProviderKind {
    IndexTts {
        server: String,
        voice_id: Option<String>,
        ref_file: Option<PathBuf>,
        ref_text: Option<String>,
        timeout: Duration,
    },
    Silent,
}

pub fn create_tts(kind: TtsProviderKind) -> Result<Box<dyn TtsProvider>> {
    match kind {
        TtsProviderKind::IndexTts { server, voice_id, ref_file, ref_text, timeout } => {
            let mut tts = IndexTts::new(server, timeout)?;
            if let Some(voice) = voice_id {
                tts = tts.with_voice(voice);
            }
            if let Some(file) = ref_file {
                tts = tts.with_reference(file, ref_text);
            }
            Ok(Box::new(tts))
        }
        TtsProviderKind::Silent => Ok(Box::new(SilentTts::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silence_tracks_text_length() {
        let tts = SilentTts::new();
        let pcm = tts.synthesize("你好").await.unwrap();
        assert_eq!(pcm.duration_ms(), 400);
        assert!(pcm.samples.iter().all(|&s| s == 0));
        assert!(tts.synthesize("   ").await.unwrap().samples.is_empty());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let tts = IndexTts::new("http://localhost:17860/", Duration::from_secs(5)).unwrap();
        assert_eq!(tts.endpoint(), "http://localhost:17860/tts");
    }

    #[test]
    fn factory_builds_named_providers() {
        let silent = create_tts(TtsProviderKind::Silent).unwrap();
        assert_eq!(silent.name(), "silent");
        let index = create_tts(TtsProviderKind::IndexTts {
            server: "http://127.0.0.1:17860".into(),
            voice_id: Some("alice".into()),
            ref_file: None,
            ref_text: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(index.name(), "indextts");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let tts = IndexTts::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap();
        assert!(tts.synthesize("hello").await.is_err());
    }

    #[tokio::test]
    async fn multipart_requires_readable_reference() {
        let tts = IndexTts::new("http://127.0.0.1:9", Duration::from_millis(300))
            .unwrap()
            .with_reference(PathBuf::from("/nonexistent/ref.wav"), None);
        let err = tts.synthesize("hello").await.unwrap_err().to_string();
        assert!(err.contains("reference voice"));
    }
}
