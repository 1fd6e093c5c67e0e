use std::ffi::OsString;
use std::path::PathBuf;

use crate::domain::{AppError, QualityTier};

pub const APP_SUBFOLDER: &str = "SimpleMediaDownloader";
pub const DEFAULT_ENGINE: &str = "yt-dlp";

pub const ENV_DESTINATION: &str = "SMD_DESTINATION";
pub const ENV_ENGINE: &str = "SMD_YTDLP";
pub const ENV_FFMPEG: &str = "SMD_FFMPEG";
pub const ENV_QUALITY: &str = "SMD_QUALITY";

/// Process-wide settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub destination_dir: PathBuf,
    pub engine_binary: PathBuf,
    /// Passed to the engine only when set explicitly.
    pub ffmpeg_location: Option<PathBuf>,
    /// Tier preselected in the UI, parsed from a label such as "720p".
    pub default_quality: QualityTier,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|key| std::env::var_os(key), |name| which::which(name).ok());

        if config.ffmpeg_location.is_none() && which::which("ffmpeg").is_err() {
            tracing::warn!("ffmpeg not found on PATH; audio extraction and merging will fail");
        }
        config
    }

    fn from_lookup(
        var: impl Fn(&str) -> Option<OsString>,
        locate: impl Fn(&str) -> Option<PathBuf>,
    ) -> Self {
        let non_empty = |key: &str| var(key).filter(|value| !value.is_empty()).map(PathBuf::from);

        let destination_dir = non_empty(ENV_DESTINATION).unwrap_or_else(default_destination);
        let engine_binary = non_empty(ENV_ENGINE)
            .or_else(|| locate(DEFAULT_ENGINE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE));

        Self {
            destination_dir,
            engine_binary,
            ffmpeg_location: non_empty(ENV_FFMPEG),
            default_quality: var(ENV_QUALITY)
                .map(|label| QualityTier::from_label(&label.to_string_lossy()))
                .unwrap_or_default(),
        }
    }

    /// Create the destination directory if it does not exist yet.
    pub fn ensure_destination(&self) -> Result<(), AppError> {
        std::fs::create_dir_all(&self.destination_dir).map_err(|e| {
            AppError::Io(format!(
                "Failed to create {}: {}",
                self.destination_dir.display(),
                e
            ))
        })
    }
}

/// `<home>/Downloads/<app subfolder>`
pub fn default_destination() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
        .join(APP_SUBFOLDER)
}
