pub mod models;
pub mod ytdlp;

use thiserror::Error;

pub use models::{EngineOptions, EngineOutput, PostProcessor, RawProgress, RawStatus};
pub use ytdlp::YtDlpEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Failed(String),

    #[error("I/O error while reading engine output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// External fetch-and-transcode engine.
///
/// `download` blocks until the engine finishes. `on_progress` is invoked
/// synchronously on the calling thread, zero or more times, in the order
/// the engine reports progress.
pub trait MediaEngine: Send + Sync + 'static {
    fn download(
        &self,
        urls: &[String],
        options: &EngineOptions,
        on_progress: &mut dyn FnMut(RawProgress),
    ) -> Result<EngineOutput>;
}
