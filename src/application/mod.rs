pub mod download_coordinator;
pub mod format_policy;
pub mod progress;

pub use download_coordinator::DownloadCoordinator;
