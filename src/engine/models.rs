use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::FormatSpec;

/// Engine-side transcode step run after the raw streams are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    ExtractAudio { codec: String, bitrate_kbps: u32 },
}

/// Configuration bundle for a single engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub format: FormatSpec,
    /// Output path template, e.g. `<dir>/%(title)s.%(ext)s`.
    pub output_template: String,
    pub quiet: bool,
    pub no_warnings: bool,
    pub post_processors: Vec<PostProcessor>,
}

impl EngineOptions {
    pub fn new(format: FormatSpec, destination: &std::path::Path) -> Self {
        Self {
            format,
            output_template: output_template(destination),
            quiet: true,
            no_warnings: true,
            post_processors: Vec::new(),
        }
    }

    pub fn with_post_processors(mut self, post_processors: Vec<PostProcessor>) -> Self {
        self.post_processors = post_processors;
        self
    }
}

/// `<destination>/<media-title>.<ext>` in the engine's template syntax
pub fn output_template(destination: &std::path::Path) -> String {
    destination
        .join("%(title)s.%(ext)s")
        .to_string_lossy()
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawStatus {
    Downloading,
    Finished,
}

/// Progress dictionary as reported by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawProgress {
    pub status: RawStatus,
    #[serde(default)]
    pub downloaded_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes: Option<f64>,
    #[serde(default)]
    pub total_bytes_estimate: Option<f64>,
    #[serde(default, rename = "_percent_str")]
    pub percent_display: Option<String>,
    #[serde(default, rename = "_speed_str")]
    pub speed_display: Option<String>,
}

#[cfg(test)]
impl RawProgress {
    pub fn downloading(downloaded: Option<f64>, total: Option<f64>) -> Self {
        Self {
            downloaded_bytes: downloaded,
            total_bytes: total,
            ..Self::empty(RawStatus::Downloading)
        }
    }

    pub fn finished() -> Self {
        Self::empty(RawStatus::Finished)
    }

    fn empty(status: RawStatus) -> Self {
        Self {
            status,
            downloaded_bytes: None,
            total_bytes: None,
            total_bytes_estimate: None,
            percent_display: None,
            speed_display: None,
        }
    }
}

/// What a successful engine call leaves behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub saved_files: Vec<PathBuf>,
}
