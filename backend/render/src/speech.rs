//! Per-session speech synthesis and the PCM buffer frames are cut from.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use livetalk_core::{AudioFrame, PcmAudio, SessionId, TtsProvider, AUDIO_FRAMES_PER_SECOND};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Rate of the PCM handed to the transport.
pub const OUTPUT_SAMPLE_RATE: u32 = 16_000;

const SAMPLES_PER_FRAME: usize = (OUTPUT_SAMPLE_RATE / AUDIO_FRAMES_PER_SECOND) as usize;

#[derive(Debug)]
enum Utterance {
    Text(String),
    AudioFile(PathBuf),
}

#[derive(Debug)]
struct Queued {
    utterance: Utterance,
    generation: u64,
}

#[derive(Default)]
struct SpeechBuffer {
    /// Bumped by `flush`; work queued under an older generation is dropped.
    generation: AtomicU64,
    pcm: Mutex<VecDeque<i16>>,
    pts: AtomicU64,
}

impl SpeechBuffer {
    fn append_if_current(&self, generation: u64, pcm: PcmAudio) -> bool {
        let pcm = pcm.resampled(OUTPUT_SAMPLE_RATE);
        let mut buf = self.pcm.lock();
        // Checked under the buffer lock so a concurrent flush cannot interleave.
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        buf.extend(pcm.samples);
        true
    }
}

/// Queue of text and audio-file utterances worked off by one task.
pub struct SpeechPipeline {
    session_id: SessionId,
    tx: mpsc::UnboundedSender<Queued>,
    buffer: Arc<SpeechBuffer>,
    worker: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
}

impl SpeechPipeline {
    /// Start the synthesis task on `runtime`. Callable from blocking threads.
    pub fn start(session_id: SessionId, tts: Arc<dyn TtsProvider>, runtime: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let buffer = Arc::new(SpeechBuffer::default());
        let worker = runtime.spawn(run_worker(session_id, rx, tts, Arc::clone(&buffer)));
        Self {
            session_id,
            tx,
            buffer,
            worker: Mutex::new(Some(worker)),
            released: AtomicBool::new(false),
        }
    }

    pub fn enqueue_text(&self, text: String) {
        self.enqueue(Utterance::Text(text));
    }

    pub fn enqueue_audio_file(&self, path: PathBuf) {
        self.enqueue(Utterance::AudioFile(path));
    }

    fn enqueue(&self, utterance: Utterance) {
        let generation = self.buffer.generation.load(Ordering::Acquire);
        if self.tx.send(Queued { utterance, generation }).is_err() {
            debug!(session_id = %self.session_id, "Speech pipeline released; dropping utterance");
        }
    }

    /// Drop buffered audio and invalidate everything queued or in flight.
    pub fn flush(&self) {
        let mut buf = self.buffer.pcm.lock();
        self.buffer.generation.fetch_add(1, Ordering::AcqRel);
        buf.clear();
    }

    pub fn is_speaking(&self) -> bool {
        !self.buffer.pcm.lock().is_empty()
    }

    /// Buffered audio in 20 ms frames.
    pub fn buffered_frames(&self) -> usize {
        self.buffer.pcm.lock().len().div_ceil(SAMPLES_PER_FRAME)
    }

    /// Next 20 ms frame, padded with silence when the buffer runs dry.
    pub fn next_frame(&self) -> AudioFrame {
        let mut samples = Vec::with_capacity(SAMPLES_PER_FRAME);
        {
            let mut buf = self.buffer.pcm.lock();
            let take = buf.len().min(SAMPLES_PER_FRAME);
            samples.extend(buf.drain(..take));
        }
        let silent = samples.is_empty();
        samples.resize(SAMPLES_PER_FRAME, 0);
        let pts = self.buffer.pts.fetch_add(SAMPLES_PER_FRAME as u64, Ordering::Relaxed);
        AudioFrame { samples, sample_rate: OUTPUT_SAMPLE_RATE, pts, silent }
    }

    /// Stop the synthesis task and drop buffered audio. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
        self.flush();
    }
}

impl Drop for SpeechPipeline {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run_worker(
    session_id: SessionId,
    mut rx: mpsc::UnboundedReceiver<Queued>,
    tts: Arc<dyn TtsProvider>,
    buffer: Arc<SpeechBuffer>,
) {
    while let Some(Queued { utterance, generation }) = rx.recv().await {
        if buffer.generation.load(Ordering::Acquire) != generation {
            continue;
        }
        let result = match &utterance {
            Utterance::Text(text) => tts.synthesize(text).await,
            Utterance::AudioFile(path) => decode_file(path.clone()).await,
        };
        match result {
            Ok(pcm) => {
                let ms = pcm.duration_ms();
                if buffer.append_if_current(generation, pcm) {
                    debug!(session_id = %session_id, ms, "Queued speech");
                } else {
                    debug!(session_id = %session_id, "Discarded speech after interrupt");
                }
            }
            Err(e) => warn!(session_id = %session_id, error = %e, ?utterance, "Speech synthesis failed"),
        }
    }
}

async fn decode_file(path: PathBuf) -> Result<PcmAudio> {
    tokio::task::spawn_blocking(move || livetalk_tts::read_wav_file(&path))
        .await
        .context("Audio decode task panicked")?
}
