//! Per-symbol snapshot window.

use chrono::{DateTime, Utc};
use serde::Serialize;
use snapshot_core::{PipelineConfig, TimeRange, TimestampMs};

/// Where the window's lower bound came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStart {
    /// Configured `since`.
    Explicit,
    /// Just after the stored watermark.
    Watermark,
    /// `until - days_back`.
    Lookback,
}

/// Half-open `[since, until)` range of bar starts to build snapshots for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotWindow {
    pub range: TimeRange,
    pub start: WindowStart,
}

impl SnapshotWindow {
    /// Compute the window for a symbol.
    ///
    /// The watermark bar itself was already built, so an incremental
    /// window starts one millisecond after it.
    pub fn compute(
        config: &PipelineConfig,
        watermark: Option<TimestampMs>,
        now: DateTime<Utc>,
    ) -> Self {
        let until = config.until_ms(now);
        let (since, start) = match (config.since, watermark) {
            (Some(since), _) => (since.timestamp_millis(), WindowStart::Explicit),
            (None, Some(mark)) if config.incremental => {
                (mark.saturating_add(1), WindowStart::Watermark)
            }
            _ => (
                until.saturating_sub(config.lookback_ms()),
                WindowStart::Lookback,
            ),
        };
        Self {
            range: TimeRange::new(since, until),
            start,
        }
    }
}
