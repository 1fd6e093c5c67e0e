use std::path::Path;

use iced::{
    widget::{button, column, pick_list, progress_bar, text, text_input, Space},
    Color, Element, Length,
};

use crate::domain::{
    AppError, DownloadPhase, DownloadRequest, ErrorKind, MediaMode, ProgressEvent, QualityTier,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Neutral,
    Working,
    Info,
    Success,
    Error,
}

impl StatusTone {
    fn color(self) -> Color {
        match self {
            StatusTone::Neutral => Color::from_rgb(0.5, 0.5, 0.5),
            StatusTone::Working => Color::from_rgb(0.95, 0.55, 0.1),
            StatusTone::Info => Color::from_rgb(0.2, 0.45, 0.9),
            StatusTone::Success => Color::from_rgb(0.2, 0.7, 0.3),
            StatusTone::Error => Color::from_rgb(0.85, 0.2, 0.2),
        }
    }
}

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub mode: MediaMode,
    pub quality: QualityTier,
    pub status_message: String,
    pub status_tone: StatusTone,
    pub progress: f32,
    pub is_downloading: bool,
    pub destination: String,
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    ModeSelected(MediaMode),
    QualitySelected(QualityTier),
    DownloadPressed,
}

pub fn error_message(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::EmptyInput => "Error: enter a URL first!".to_string(),
        ErrorKind::MissingTranscoder => "Error: FFmpeg is not installed or not reachable.".to_string(),
        ErrorKind::UnsupportedSource => "Error: unsupported or invalid URL.".to_string(),
        ErrorKind::Unknown { snippet } => format!("Unknown error: {}...", snippet),
    }
}

impl DownloadView {
    pub fn new(destination: &Path, quality: QualityTier) -> Self {
        Self {
            url: String::new(),
            mode: MediaMode::default(),
            quality,
            status_message: "Waiting for a URL...".to_string(),
            status_tone: StatusTone::Neutral,
            progress: 0.0,
            is_downloading: false,
            destination: destination.display().to_string(),
        }
    }

    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::ModeSelected(mode) => {
                self.mode = mode;
            }
            DownloadMessage::QualitySelected(quality) => {
                self.quality = quality;
            }
            DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    /// Snapshot of the form. The quality tier only travels with video.
    pub fn request(&self) -> DownloadRequest {
        let quality = match self.mode {
            MediaMode::Video => Some(self.quality),
            MediaMode::Audio => None,
        };
        DownloadRequest::new(self.url.clone(), self.mode, quality)
    }

    fn set_status(&mut self, message: impl Into<String>, tone: StatusTone) {
        self.status_message = message.into();
        self.status_tone = tone;
    }

    pub fn begin(&mut self) {
        self.is_downloading = true;
        self.progress = 0.0;
    }

    pub fn reject(&mut self, error: &AppError) {
        let message = match error {
            AppError::EmptyInput => error_message(&ErrorKind::EmptyInput),
            other => format!("Error: {}", other),
        };
        self.set_status(message, StatusTone::Error);
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match event.phase {
            DownloadPhase::Idle => {}
            DownloadPhase::Starting => {
                self.is_downloading = true;
                self.progress = 0.0;
                self.set_status("Looking up media info...", StatusTone::Working);
            }
            DownloadPhase::Downloading => {
                let rate = event.rate_label.as_deref().unwrap_or("? B/s");
                let message = match event.fraction {
                    Some(fraction) => {
                        self.progress = fraction as f32;
                        let percent = event
                            .percent_label
                            .clone()
                            .unwrap_or_else(|| format!("{:.1}%", fraction * 100.0));
                        format!("Downloading: {} at {}", percent, rate)
                    }
                    None => format!("Downloading (size unknown) at {}", rate),
                };
                self.set_status(message, StatusTone::Working);
            }
            DownloadPhase::Merging => {
                self.progress = 1.0;
                self.set_status("Merging video and audio (FFmpeg)...", StatusTone::Info);
            }
            DownloadPhase::Done => {
                self.is_downloading = false;
                self.progress = 1.0;
                let message = match &event.saved_to {
                    Some(path) => format!("Download complete! Saved {}", path.display()),
                    None => "Download complete!".to_string(),
                };
                self.set_status(message, StatusTone::Success);
            }
            DownloadPhase::Failed => {
                self.is_downloading = false;
                self.progress = 0.0;
                let message = event
                    .error
                    .as_ref()
                    .map(error_message)
                    .unwrap_or_else(|| "Download failed".to_string());
                self.set_status(message, StatusTone::Error);
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let mut content = column![
            text("Video / Audio Downloader").size(32),
            Space::new().height(Length::Fixed(10.0)),
            text("Media URL:").size(16),
            text_input("Paste the URL here...", &self.url)
                .on_input(DownloadMessage::UrlChanged)
                .on_submit(DownloadMessage::DownloadPressed)
                .padding(10),
            pick_list(
                MediaMode::ALL,
                Some(self.mode),
                DownloadMessage::ModeSelected
            ),
        ];

        // Quality only matters for video.
        if self.mode == MediaMode::Video {
            content = content.push(text("Video quality:").size(16)).push(pick_list(
                QualityTier::ALL,
                Some(self.quality),
                DownloadMessage::QualitySelected,
            ));
        }

        content
            .push(
                button("Download")
                    .on_press_maybe((!self.is_downloading).then_some(DownloadMessage::DownloadPressed))
                    .padding([10, 20]),
            )
            .push(
                text(&self.status_message)
                    .size(14)
                    .color(self.status_tone.color()),
            )
            .push(progress_bar(0.0..=1.0, self.progress))
            .push(
                text(format!("Saving to: {}", self.destination))
                    .size(10)
                    .color(StatusTone::Neutral.color()),
            )
            .padding(20)
            .spacing(10)
            .into()
    }
}
