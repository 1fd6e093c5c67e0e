pub mod error;
pub mod model;

pub use error::{AppError, ErrorKind};
pub use model::{
    DownloadPhase, DownloadRequest, FormatSpec, MediaMode, ProgressEvent, QualityTier,
    SessionId,
};
