use thiserror::Error;

use crate::utils::snippet;

/// Longest slice of raw engine text shown for unclassified failures.
pub const SNIPPET_LEN: usize = 45;

const MISSING_TRANSCODER_MARKERS: &[&str] = &["ffmpeg is not installed", "ffmpeg not found"];
const UNSUPPORTED_SOURCE_MARKERS: &[&str] = &["unsupported url", "is not a valid url"];

/// Rejections raised before a session exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Enter a URL first")]
    EmptyInput,

    #[error("A download is already in progress")]
    SessionActive,

    #[error("I/O error: {0}")]
    Io(String),
}

/// Failure taxonomy carried by a `Failed` progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyInput,
    MissingTranscoder,
    UnsupportedSource,
    Unknown { snippet: String },
}

impl ErrorKind {
    /// Classifies raw engine error text by the markers the engine prints.
    pub fn classify(text: &str) -> Self {
        let lowered = text.to_lowercase();
        if MISSING_TRANSCODER_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            ErrorKind::MissingTranscoder
        } else if UNSUPPORTED_SOURCE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            ErrorKind::UnsupportedSource
        } else {
            ErrorKind::Unknown {
                snippet: snippet(text, SNIPPET_LEN),
            }
        }
    }
}

impl From<&AppError> for ErrorKind {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::EmptyInput => ErrorKind::EmptyInput,
            other => ErrorKind::Unknown {
                snippet: snippet(&other.to_string(), SNIPPET_LEN),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_missing_transcoder() {
        let text = "ERROR: You have requested merging of multiple formats but ffmpeg is not installed. Aborting due to --abort-on-error";
        assert_eq!(ErrorKind::classify(text), ErrorKind::MissingTranscoder);
        assert_eq!(
            ErrorKind::classify("ERROR: Postprocessing: ffprobe and ffmpeg not found."),
            ErrorKind::MissingTranscoder
        );
    }

    #[test]
    fn test_classify_unsupported_source() {
        let text = "ERROR: Unsupported URL: https://nothing.example/";
        assert_eq!(ErrorKind::classify(text), ErrorKind::UnsupportedSource);
    }

    #[test]
    fn test_classify_unknown_is_bounded() {
        let text = "ERROR: [youtube] abc: Sign in to confirm you're not a bot. This helps protect our community.";
        match ErrorKind::classify(text) {
            ErrorKind::Unknown { snippet } => {
                assert_eq!(snippet.chars().count(), SNIPPET_LEN);
                assert!(text.starts_with(&snippet));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_maps_to_kind() {
        assert_eq!(ErrorKind::from(&AppError::EmptyInput), ErrorKind::EmptyInput);
    }
}
