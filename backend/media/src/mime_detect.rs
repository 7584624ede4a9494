//! MIME type detection for uploaded media.

use std::path::Path;

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "wav"          => "audio/wav",
        "mp3"          => "audio/mpeg",
        "ogg"          => "audio/ogg",
        "flac"         => "audio/flac",
        "m4a"          => "audio/mp4",
        "opus"         => "audio/opus",
        "aac"          => "audio/aac",
        "webm"         => "audio/webm",

        "mp4"          => "video/mp4",
        "png"          => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt"          => "text/plain",

        _              => "application/octet-stream",
    }
}

pub fn is_audio(mime: &str) -> bool {
    mime.starts_with("audio/")
}

/// Audio the speech pipeline can decode: PCM WAV only.
pub fn is_playable_audio(mime: &str) -> bool {
    mime == "audio/wav"
}

/// True when `data` starts with a RIFF/WAVE header.
pub fn has_wav_header(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_extensions() {
        assert_eq!(detect_mime_type(Path::new("clip.WAV")), "audio/wav");
        assert!(is_audio(detect_mime_type(Path::new("a.mp3"))));
        assert!(!is_audio(detect_mime_type(Path::new("a.exe"))));
        assert!(!is_audio(detect_mime_type(Path::new("noext"))));
    }

    #[test]
    fn only_wav_is_playable() {
        assert!(is_playable_audio(detect_mime_type(Path::new("a.wav"))));
        for name in ["a.mp3", "a.ogg", "a.flac", "a.m4a"] {
            assert!(!is_playable_audio(detect_mime_type(Path::new(name))), "{name}");
        }
        assert!(has_wav_header(b"RIFF\x24\0\0\0WAVEfmt "));
        assert!(!has_wav_header(b"ID3\x03\0\0\0\0\0\0\0\0"));
        assert!(!has_wav_header(b"RIFF"));
    }
}
