//! Configuration structures for the snapshot pipeline.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{TimestampMs, MINUTE_MS};

/// Main configuration for an enrichment and snapshot run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Explicit lower bound for snapshot building (overrides the watermark).
    pub since: Option<DateTime<Utc>>,
    /// Explicit upper bound (exclusive); defaults to now.
    pub until: Option<DateTime<Utc>>,
    /// Lookback used when no watermark exists or incremental mode is off.
    pub days_back: u32,
    /// Resume from the stored watermark instead of reprocessing `days_back`.
    pub incremental: bool,
    /// Bar updates buffered before a bulk write.
    pub indicator_batch_size: usize,
    /// Snapshots buffered before a bulk upsert.
    pub snapshot_batch_size: usize,
    /// Quote/trade join configuration.
    pub join: JoinConfig,
    /// Symbols processed concurrently (0 = number of CPUs).
    pub workers: usize,
    /// Restrict the run to these symbols; empty means all registered.
    pub symbols: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            since: None,
            until: None,
            days_back: 7,
            incremental: true,
            indicator_batch_size: 1000,
            snapshot_batch_size: 500,
            join: JoinConfig::default(),
            workers: 0,
            symbols: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.indicator_batch_size == 0 {
            return Err(Error::config("indicator_batch_size must be > 0"));
        }
        if self.snapshot_batch_size == 0 {
            return Err(Error::config("snapshot_batch_size must be > 0"));
        }
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since >= until {
                return Err(Error::config(format!(
                    "since ({since}) must be before until ({until})"
                )));
            }
        }
        self.join.validate()
    }

    /// Effective upper bound in milliseconds.
    pub fn until_ms(&self, now: DateTime<Utc>) -> TimestampMs {
        self.until.unwrap_or(now).timestamp_millis()
    }

    /// Default lookback in milliseconds.
    pub fn lookback_ms(&self) -> i64 {
        Duration::days(i64::from(self.days_back)).num_milliseconds()
    }

    /// Resolved worker count.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }

    /// Whether a symbol passes the allow-list.
    pub fn wants_symbol(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

/// Quote and trade join configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Bar width.
    pub interval_ms: i64,
    /// Slack added on each side when an interval has no quotes.
    pub quote_slack_ms: i64,
    /// Records scanned when looking before/after an interval.
    pub fallback_limit: usize,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            interval_ms: MINUTE_MS,
            quote_slack_ms: 30_000,
            fallback_limit: 50,
        }
    }
}

impl JoinConfig {
    fn validate(&self) -> Result<()> {
        if self.interval_ms <= 0 {
            return Err(Error::config("interval_ms must be > 0"));
        }
        if self.quote_slack_ms < 0 {
            return Err(Error::config("quote_slack_ms must be >= 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.incremental);
        assert_eq!(config.days_back, 7);
        assert_eq!(config.join.interval_ms, 60_000);
        assert_eq!(config.join.quote_slack_ms, 30_000);
        assert_eq!(config.join.fallback_limit, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"days_back": 2, "join": {"fallback_limit": 10}}"#).unwrap();
        assert_eq!(config.days_back, 2);
        assert_eq!(config.join.fallback_limit, 10);
        assert_eq!(config.join.quote_slack_ms, 30_000);
        assert!(config.incremental);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = PipelineConfig {
            snapshot_batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config: PipelineConfig = serde_json::from_str(
            r#"{"since": "2024-01-02T00:00:00Z", "until": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        for join in [
            JoinConfig {
                interval_ms: 0,
                ..Default::default()
            },
            JoinConfig {
                quote_slack_ms: -1,
                ..Default::default()
            },
        ] {
            let config = PipelineConfig {
                join,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_symbol_allow_list() {
        let mut config = PipelineConfig::default();
        assert!(config.wants_symbol("AAPL"));
        config.symbols = vec!["msft".to_string()];
        assert!(config.wants_symbol("MSFT"));
        assert!(!config.wants_symbol("AAPL"));
    }
}
