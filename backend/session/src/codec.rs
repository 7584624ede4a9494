//! Video codec preference policy.

use livetalk_core::{CodecCapability, LiveTalkError, MediaKind, PeerTransport};
use tracing::{info, warn};

/// Primary family, fallback family, then retransmission.
pub const DEFAULT_VIDEO_CODEC_PRIORITY: [&str; 3] = ["video/H264", "video/VP8", "video/rtx"];

/// For each family in `priority`, append every matching capability in its
/// original order. Families are matched on mime type, case-insensitively.
/// Duplicates are kept; capabilities of unlisted families are dropped.
pub fn order_codec_preferences<S: AsRef<str>>(
    capabilities: &[CodecCapability],
    priority: &[S],
) -> Vec<CodecCapability> {
    priority
        .iter()
        .flat_map(|family| {
            capabilities
                .iter()
                .filter(move |c| c.mime_type.eq_ignore_ascii_case(family.as_ref()))
        })
        .cloned()
        .collect()
}

/// Best effort: order the transport's video codecs and apply them. Failures
/// are logged and the transport keeps its default ordering.
pub fn apply_codec_preferences<S: AsRef<str>>(
    transport: &dyn PeerTransport,
    priority: &[S],
) -> Result<Vec<CodecCapability>, LiveTalkError> {
    let capabilities = transport.codec_capabilities(MediaKind::Video);
    let preferences = order_codec_preferences(&capabilities, priority);
    if preferences.is_empty() {
        let err = LiveTalkError::CodecPreferenceFailure(format!(
            "none of {} advertised video codecs match the priority list",
            capabilities.len()
        ));
        warn!(error = %err, "Failed to set codec preferences");
        return Err(err);
    }

    match transport.set_codec_preferences(MediaKind::Video, preferences.clone()) {
        Ok(()) => {
            let head: Vec<&str> = preferences.iter().take(3).map(|c| c.mime_type.as_str()).collect();
            info!(codecs = ?head, "Set codec preferences");
            Ok(preferences)
        }
        Err(e) => {
            warn!(error = %e, "Failed to set codec preferences");
            Err(e)
        }
    }
}
