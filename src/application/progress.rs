use crate::domain::ProgressEvent;
use crate::engine::{RawProgress, RawStatus};
use crate::utils::clean_display;

/// Normalizes one engine progress report.
///
/// `Done` is never produced here; the orchestrator infers it from the
/// engine call returning.
pub fn translate(raw: &RawProgress) -> ProgressEvent {
    match raw.status {
        RawStatus::Downloading => ProgressEvent::downloading(
            fraction(raw),
            raw.speed_display.as_deref().map(clean_display),
        )
        .with_percent_label(raw.percent_display.as_deref().map(clean_display)),
        RawStatus::Finished => ProgressEvent::merging(),
    }
}

fn fraction(raw: &RawProgress) -> Option<f64> {
    let total = raw
        .total_bytes
        .or(raw.total_bytes_estimate)
        .filter(|total| *total > 0.0)?;
    let downloaded = raw.downloaded_bytes?;
    Some((downloaded / total).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DownloadPhase;

    #[test]
    fn test_known_total() {
        let event = translate(&RawProgress::downloading(Some(50.0), Some(200.0)));
        assert_eq!(event.phase, DownloadPhase::Downloading);
        assert_eq!(event.fraction, Some(0.25));
    }

    #[test]
    fn test_unknown_total_is_indeterminate() {
        let event = translate(&RawProgress::downloading(Some(50.0), None));
        assert_eq!(event.phase, DownloadPhase::Downloading);
        assert_eq!(event.fraction, None);

        let zero_total = translate(&RawProgress::downloading(Some(50.0), Some(0.0)));
        assert_eq!(zero_total.fraction, None);
    }

    #[test]
    fn test_estimate_used_when_total_missing() {
        let raw = RawProgress {
            total_bytes_estimate: Some(400.0),
            ..RawProgress::downloading(Some(100.0), None)
        };
        assert_eq!(translate(&raw).fraction, Some(0.25));
    }

    #[test]
    fn test_labels_are_cleaned() {
        let raw = RawProgress {
            percent_display: Some("\u{1b}[0;94m 25.0%\u{1b}[0m".into()),
            speed_display: Some(" 2.50MiB/s".into()),
            ..RawProgress::downloading(Some(50.0), Some(200.0))
        };
        let event = translate(&raw);
        assert_eq!(event.percent_label.as_deref(), Some("25.0%"));
        assert_eq!(event.rate_label.as_deref(), Some("2.50MiB/s"));
    }

    #[test]
    fn test_finished_always_merging_at_full() {
        let raw = RawProgress {
            downloaded_bytes: Some(10.0),
            total_bytes: Some(100.0),
            ..RawProgress::finished()
        };
        let event = translate(&raw);
        assert_eq!(event.phase, DownloadPhase::Merging);
        assert_eq!(event.fraction, Some(1.0));
    }
}
