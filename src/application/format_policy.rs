use crate::domain::{DownloadRequest, FormatSpec, MediaMode, QualityTier};
use crate::engine::PostProcessor;

pub const AUDIO_CODEC: &str = "mp3";
pub const AUDIO_BITRATE_KBPS: u32 = 192;

const AUDIO_FORMAT: &str = "bestaudio/best";
/// Audio paired with the video floor; m4a muxes into mp4 without re-encoding.
const PAIRED_AUDIO: &str = "bestaudio[ext=m4a]";
const SINGLE_FILE_FALLBACK: &str = "best[ext=mp4]";
const ANY_FALLBACK: &str = "best";

fn video_floor(tier: QualityTier) -> String {
    match tier.max_height() {
        Some(height) => format!("bestvideo[height<={}]", height),
        None => "bestvideo".to_string(),
    }
}

/// Format-selection expression for a request.
///
/// Video resolves to `<floor>+<audio>/<single file>/<anything>` so the
/// engine always has something playable to fall back on. Audio ignores
/// the quality tier entirely.
pub fn resolve(request: &DownloadRequest) -> FormatSpec {
    match request.mode() {
        MediaMode::Audio => FormatSpec::new(AUDIO_FORMAT),
        MediaMode::Video => FormatSpec::new(format!(
            "{}+{}/{}/{}",
            video_floor(request.quality()),
            PAIRED_AUDIO,
            SINGLE_FILE_FALLBACK,
            ANY_FALLBACK
        )),
    }
}

pub fn post_processing(mode: MediaMode) -> Vec<PostProcessor> {
    match mode {
        MediaMode::Video => Vec::new(),
        MediaMode::Audio => vec![PostProcessor::ExtractAudio {
            codec: AUDIO_CODEC.to_string(),
            bitrate_kbps: AUDIO_BITRATE_KBPS,
        }],
    }
}
