//! Minimal SDP handling: media section discovery and answer generation.

use livetalk_core::{CodecCapability, LiveTalkError, MediaKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    pub kind: MediaKind,
    pub mid: String,
}

/// List the audio/video `m=` sections of an offer, in order. Sections of
/// other kinds (e.g. `application`) are skipped.
pub fn parse_media_sections(sdp: &str) -> Result<Vec<MediaSection>, LiveTalkError> {
    if !sdp.trim_start().starts_with("v=0") {
        return Err(LiveTalkError::Negotiation("offer is not an SDP body (missing v=0)".into()));
    }

    let mut sections: Vec<MediaSection> = Vec::new();
    let mut current: Option<MediaKind> = None;
    for line in sdp.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("m=") {
            current = match rest.split_whitespace().next() {
                Some("audio") => Some(MediaKind::Audio),
                Some("video") => Some(MediaKind::Video),
                _ => None,
            };
            if let Some(kind) = current {
                sections.push(MediaSection { kind, mid: sections.len().to_string() });
            }
        } else if let (Some(mid), Some(_)) = (line.strip_prefix("a=mid:"), current) {
            if let Some(last) = sections.last_mut() {
                last.mid = mid.to_string();
            }
        }
    }
    Ok(sections)
}

/// Build a send-only answer for `sections`, listing codecs in the given order
/// with dynamic payload types from 96 up.
pub fn build_answer(
    session_tag: &str,
    sections: &[MediaSection],
    codecs_for: impl Fn(MediaKind) -> Vec<CodecCapability>,
) -> String {
    let mut out = String::new();
    out.push_str("v=0\r\n");
    out.push_str(&format!("o=livetalk {session_tag} 2 IN IP4 127.0.0.1\r\n"));
    out.push_str("s=-\r\nt=0 0\r\n");
    let mids: Vec<&str> = sections.iter().map(|s| s.mid.as_str()).collect();
    out.push_str(&format!("a=group:BUNDLE {}\r\n", mids.join(" ")));

    let mut next_pt = 96u32;
    for section in sections {
        let codecs = codecs_for(section.kind);
        let pts: Vec<u32> = (next_pt..next_pt + codecs.len() as u32).collect();
        next_pt += codecs.len() as u32;
        let kind = match section.kind {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        };
        let pt_list: Vec<String> = pts.iter().map(u32::to_string).collect();
        out.push_str(&format!("m={kind} 9 UDP/TLS/RTP/SAVPF {}\r\n", pt_list.join(" ")));
        out.push_str("c=IN IP4 0.0.0.0\r\n");
        out.push_str(&format!("a=mid:{}\r\na=sendonly\r\n", section.mid));
        for (pt, codec) in pts.iter().zip(&codecs) {
            out.push_str(&format!("a=rtpmap:{pt} {}/{}\r\n", codec.name(), codec.clock_rate));
            if let Some(fmtp) = &codec.sdp_fmtp_line {
                out.push_str(&format!("a=fmtp:{pt} {fmtp}\r\n"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:a0\r\na=recvonly\r\n\
        m=application 9 DTLS/SCTP 5000\r\na=mid:data\r\n\
        m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=mid:v1\r\na=recvonly\r\n";

    #[test]
    fn finds_audio_and_video_sections() {
        let sections = parse_media_sections(OFFER).unwrap();
        assert_eq!(
            sections,
            vec![
                MediaSection { kind: MediaKind::Audio, mid: "a0".into() },
                MediaSection { kind: MediaKind::Video, mid: "v1".into() },
            ]
        );
    }

    #[test]
    fn rejects_non_sdp() {
        assert!(parse_media_sections("hello").is_err());
    }

    #[test]
    fn answer_lists_codecs_in_order() {
        let sections = parse_media_sections(OFFER).unwrap();
        let answer = build_answer("123456", &sections, |kind| match kind {
            MediaKind::Audio => vec![CodecCapability::new("audio/opus", 48_000)],
            MediaKind::Video => vec![
                CodecCapability::new("video/H264", 90_000).with_fmtp("packetization-mode=1"),
                CodecCapability::new("video/VP8", 90_000),
            ],
        });
        assert!(answer.starts_with("v=0\r\n"));
        assert!(answer.contains("a=group:BUNDLE a0 v1"));
        assert!(answer.contains("m=video 9 UDP/TLS/RTP/SAVPF 97 98"));
        let h264 = answer.find("a=rtpmap:97 H264/90000").unwrap();
        let vp8 = answer.find("a=rtpmap:98 VP8/90000").unwrap();
        assert!(h264 < vp8);
        assert!(answer.contains("a=fmtp:97 packetization-mode=1"));
    }
}
