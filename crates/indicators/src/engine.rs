//! Indicator enrichment job.
//!
//! For each symbol: load the full bar history, sort it by timestamp,
//! advance one `IndicatorSet` through it, and write the computed fields
//! back onto each bar in bounded batches.

use serde::Serialize;
use snapshot_core::store::full_history;
use snapshot_core::{BarUpdate, BatchWriter, MarketStore, PipelineConfig, Result, RunSummary};
use tracing::{debug, error, info};

use crate::set::{BarInput, IndicatorSet};
use crate::Indicator;

/// Per-symbol enrichment outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorReport {
    pub symbol: String,
    /// Bars loaded.
    pub bars: usize,
    /// Bars skipped for missing or non-finite prices.
    pub skipped: usize,
    /// Bar updates queued for writing.
    pub updates: usize,
    /// Bars the store reported as updated.
    pub written: usize,
    /// Batches lost to write failures.
    pub failed_flushes: usize,
}

/// Computes indicators and persists them onto bars.
pub struct IndicatorEngine<'a, S: MarketStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: MarketStore + ?Sized> IndicatorEngine<'a, S> {
    /// Create an engine over a store.
    pub fn new(store: &'a S, config: &PipelineConfig) -> Self {
        Self {
            store,
            batch_size: config.indicator_batch_size,
        }
    }

    /// Enrich one symbol's full history.
    ///
    /// A read failure aborts the symbol with `Err`; write failures are
    /// counted in the report and processing continues.
    pub fn enrich_symbol(&self, symbol: &str) -> Result<IndicatorReport> {
        let mut bars = self.store.bars(symbol, full_history())?;
        // Store order is not trusted.
        bars.sort_by_key(|bar| bar.ts_ms);

        let mut report = IndicatorReport {
            symbol: symbol.to_string(),
            bars: bars.len(),
            ..Default::default()
        };
        let store = self.store;
        let mut writer = BatchWriter::new("indicators", self.batch_size, |batch: &[BarUpdate]| {
            store.update_bars(batch)
        });
        let mut state = IndicatorSet::default();

        for bar in &bars {
            let Some(input) = BarInput::from_record(bar) else {
                debug!(symbol, ts_ms = bar.ts_ms, "skipping bar without usable prices");
                report.skipped += 1;
                continue;
            };
            let (next, values) = state.advance(input);
            state = next;

            let Some(values) = values.filter(|v| !v.is_empty()) else {
                continue;
            };
            report.updates += 1;
            writer.push(BarUpdate {
                symbol: symbol.to_string(),
                ts_ms: bar.ts_ms,
                values,
            });
        }

        let (_, stats) = writer.finish();
        report.written = stats.written;
        report.failed_flushes = stats.failed_flushes;

        info!(
            symbol,
            bars = report.bars,
            skipped = report.skipped,
            written = report.written,
            failed_flushes = report.failed_flushes,
            "indicators enriched"
        );
        Ok(report)
    }

    /// Enrich symbols one after another. A failed symbol does not stop
    /// the run.
    pub fn run(&self, symbols: &[String]) -> RunSummary<IndicatorReport> {
        let mut summary = RunSummary::default();
        for symbol in symbols {
            let result = self.enrich_symbol(symbol);
            if let Err(e) = &result {
                error!(symbol = %symbol, error = %e, "indicator enrichment aborted");
            }
            summary.record(symbol, result);
        }
        summary
    }
}
