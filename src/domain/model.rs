use std::fmt;
use std::path::PathBuf;

use super::error::ErrorKind;

/// Identifies one submission; stamped on every event it produces.
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaMode {
    #[default]
    Video,
    Audio,
}

impl MediaMode {
    pub const ALL: [MediaMode; 2] = [MediaMode::Video, MediaMode::Audio];
}

impl fmt::Display for MediaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaMode::Video => f.write_str("Video (MP4)"),
            MediaMode::Audio => f.write_str("Audio (MP3)"),
        }
    }
}

/// Height cap applied to the video stream. Ignored in audio mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityTier {
    #[default]
    Max,
    High,
    Medium,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Max, QualityTier::High, QualityTier::Medium];

    /// Maps a free-form quality label onto a tier. Anything that does not
    /// mention 720p or 480p is treated as the unconstrained tier.
    pub fn from_label(label: &str) -> Self {
        if label.contains("720p") {
            QualityTier::High
        } else if label.contains("480p") {
            QualityTier::Medium
        } else {
            QualityTier::Max
        }
    }

    pub fn max_height(self) -> Option<u32> {
        match self {
            QualityTier::Max => None,
            QualityTier::High => Some(720),
            QualityTier::Medium => Some(480),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::Max => f.write_str("Maximum (1080p+)"),
            QualityTier::High => f.write_str("High (720p)"),
            QualityTier::Medium => f.write_str("Medium (480p)"),
        }
    }
}

/// What the user asked for at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    mode: MediaMode,
    quality: Option<QualityTier>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, mode: MediaMode, quality: Option<QualityTier>) -> Self {
        Self {
            url: url.into().trim().to_string(),
            mode,
            quality,
        }
    }

    pub fn video(url: impl Into<String>, quality: QualityTier) -> Self {
        Self::new(url, MediaMode::Video, Some(quality))
    }

    pub fn audio(url: impl Into<String>) -> Self {
        Self::new(url, MediaMode::Audio, None)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> MediaMode {
        self.mode
    }

    /// Effective tier; a missing tier means unconstrained.
    pub fn quality(&self) -> QualityTier {
        self.quality.unwrap_or_default()
    }
}

/// Format-selection expression handed verbatim to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec(String);

impl FormatSpec {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Starting,
    Downloading,
    Merging,
    Done,
    Failed,
}

impl DownloadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadPhase::Done | DownloadPhase::Failed)
    }

    /// Legal edges of the session state machine. `Failed` is reachable
    /// from every non-terminal phase.
    pub fn can_advance_to(self, next: DownloadPhase) -> bool {
        use DownloadPhase::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Starting) => true,
            (Starting, Downloading | Merging | Done) => true,
            (Downloading, Downloading | Merging | Done) => true,
            (Merging, Downloading | Merging | Done) => true,
            _ => false,
        }
    }
}

/// Normalized progress published to the observer. Only the latest one
/// matters to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Set by the coordinator when the event is published.
    pub session: Option<SessionId>,
    pub phase: DownloadPhase,
    /// `None` means indeterminate, not zero.
    pub fraction: Option<f64>,
    pub rate_label: Option<String>,
    pub percent_label: Option<String>,
    pub error: Option<ErrorKind>,
    pub saved_to: Option<PathBuf>,
}

impl ProgressEvent {
    fn bare(phase: DownloadPhase, fraction: Option<f64>) -> Self {
        Self {
            session: None,
            phase,
            fraction,
            rate_label: None,
            percent_label: None,
            error: None,
            saved_to: None,
        }
    }

    pub fn starting() -> Self {
        Self::bare(DownloadPhase::Starting, None)
    }

    pub fn downloading(fraction: Option<f64>, rate_label: Option<String>) -> Self {
        Self {
            rate_label,
            ..Self::bare(DownloadPhase::Downloading, fraction)
        }
    }

    pub fn merging() -> Self {
        Self::bare(DownloadPhase::Merging, Some(1.0))
    }

    pub fn done(saved_to: Option<PathBuf>) -> Self {
        Self {
            saved_to,
            ..Self::bare(DownloadPhase::Done, Some(1.0))
        }
    }

    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            error: Some(kind),
            ..Self::bare(DownloadPhase::Failed, None)
        }
    }

    pub fn with_percent_label(mut self, label: Option<String>) -> Self {
        self.percent_label = label;
        self
    }

    pub fn for_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn belongs_to(&self, session: SessionId) -> bool {
        self.session == Some(session)
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
