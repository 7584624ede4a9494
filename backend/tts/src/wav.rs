//! WAV decoding to mono 16-bit PCM.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use livetalk_core::PcmAudio;

/// Decode WAV bytes. Multi-channel input is averaged down to mono.
pub fn decode_wav(bytes: &[u8]) -> Result<PcmAudio> {
    let reader = WavReader::new(Cursor::new(bytes)).context("Response is not a WAV stream")?;
    decode(reader)
}

/// Read and decode a WAV file from disk. Blocking; call from a blocking task.
pub fn read_wav_file(path: &Path) -> Result<PcmAudio> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    decode(reader)
}

fn decode<R: std::io::Read>(reader: WavReader<R>) -> Result<PcmAudio> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader.into_samples::<i16>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let shift = u32::from(bits) - 16;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Int, 8) => reader
            .into_samples::<i8>()
            .map(|s| s.map(|v| i16::from(v) << 8))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
            .collect::<Result<_, _>>()?,
        (format, bits) => bail!("Unsupported WAV sample format {format:?} at {bits} bits"),
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    };

    Ok(PcmAudio::new(samples, spec.sample_rate))
}

#[cfg(test)]
pub(crate) fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mono_16bit() {
        let bytes = encode_wav(&[0, 1000, -1000, 42], 24_000, 1);
        let pcm = decode_wav(&bytes).unwrap();
        assert_eq!(pcm.sample_rate, 24_000);
        assert_eq!(pcm.samples, vec![0, 1000, -1000, 42]);
    }

    #[test]
    fn stereo_is_downmixed() {
        let bytes = encode_wav(&[100, 300, -200, 200], 16_000, 2);
        let pcm = decode_wav(&bytes).unwrap();
        assert_eq!(pcm.samples, vec![200, 0]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_wav(b"{\"error\": \"text is required\"}").is_err());
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        std::fs::write(&path, encode_wav(&[7; 160], 16_000, 1)).unwrap();
        let pcm = read_wav_file(&path).unwrap();
        assert_eq!(pcm.samples.len(), 160);
        assert_eq!(pcm.duration_ms(), 10);
    }
}
