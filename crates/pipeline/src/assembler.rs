//! Snapshot assembly.
//!
//! For each bar in a symbol's window, in ascending order: resolve the
//! NBBO context and trade statistics of the bar's interval, merge them
//! with the bar's own OHLCV and indicator fields, and queue one snapshot
//! keyed by `(symbol, t)`. Snapshots are upserted in bounded batches.
//!
//! The watermark only moves past snapshots that reached the store: it
//! advances to the last snapshot of the last batch written before the
//! first failed flush.

use chrono::{DateTime, Utc};
use serde::Serialize;
use snapshot_core::{
    format_ts, ts_to_datetime, BarFields, BatchWriter, IndicatorValues, MarketStore, PipelineConfig, Record,
    Result, RunSummary, Snapshot, SymbolRecord, TimeRange, TimestampMs,
};
use snapshot_microstructure::{NbboResolver, TradeAggregator};
use tracing::{debug, error, info, warn};

use crate::window::SnapshotWindow;

/// Per-symbol assembly outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotReport {
    pub symbol: String,
    pub window: SnapshotWindow,
    /// Bars found in the window.
    pub bars: usize,
    /// Bars without a representable timestamp.
    pub skipped: usize,
    /// Snapshots assembled and queued.
    pub snapshots: usize,
    /// Snapshots the store accepted.
    pub written: usize,
    /// Batches lost to write failures.
    pub failed_flushes: usize,
    pub watermark_before: Option<TimestampMs>,
    pub watermark_after: Option<TimestampMs>,
}

/// Builds snapshots for one symbol at a time.
pub struct SnapshotAssembler<'a, S: MarketStore + ?Sized> {
    store: &'a S,
    config: &'a PipelineConfig,
    nbbo: NbboResolver<'a, S>,
    trades: TradeAggregator<'a, S>,
}

impl<'a, S: MarketStore + ?Sized> SnapshotAssembler<'a, S> {
    pub fn new(store: &'a S, config: &'a PipelineConfig) -> Self {
        Self {
            store,
            config,
            nbbo: NbboResolver::new(store, &config.join),
            trades: TradeAggregator::new(store),
        }
    }

    /// Assemble one interval.
    pub fn assemble(&self, bar: &Record, received_at: DateTime<Utc>) -> Result<Option<Snapshot>> {
        let Some(t) = ts_to_datetime(bar.ts_ms) else {
            return Ok(None);
        };
        let interval = TimeRange::interval(bar.ts_ms, self.config.join.interval_ms);
        let nbbo = self.nbbo.resolve(&bar.symbol, interval)?;
        let trades = self.trades.aggregate(&bar.symbol, interval)?;

        Ok(Some(Snapshot {
            symbol: bar.symbol.clone(),
            t,
            bar: BarFields::from_record(bar),
            indicators: IndicatorValues::from_document(&bar.doc),
            nbbo,
            trades,
            received_at,
        }))
    }

    /// Build and store snapshots for one symbol's window.
    ///
    /// A read failure stops the symbol and returns `Err`, after whatever
    /// was already assembled has been flushed and the watermark moved past
    /// it.
    pub fn build_symbol(&self, record: &SymbolRecord, now: DateTime<Utc>) -> Result<SnapshotReport> {
        let symbol = record.symbol.as_str();
        let window = SnapshotWindow::compute(self.config, record.watermark, now);
        let mut report = SnapshotReport {
            symbol: symbol.to_string(),
            window,
            bars: 0,
            skipped: 0,
            snapshots: 0,
            written: 0,
            failed_flushes: 0,
            watermark_before: record.watermark,
            watermark_after: record.watermark,
        };

        let mut bars = self.store.bars(symbol, window.range)?;
        bars.sort_by_key(|bar| bar.ts_ms);
        report.bars = bars.len();
        if bars.is_empty() {
            debug!(
                symbol,
                start = %format_ts(window.range.start),
                end = %format_ts(window.range.end),
                "no bars in window"
            );
            return Ok(report);
        }

        let store = self.store;
        let mut durable: Option<TimestampMs> = None;
        let mut broken = false;
        let mut writer = BatchWriter::new(
            "snapshots",
            self.config.snapshot_batch_size,
            |batch: &[Snapshot]| {
                let result = store.upsert_snapshots(batch);
                match &result {
                    Ok(_) if !broken => {
                        durable = batch.iter().map(Snapshot::ts_ms).max().or(durable);
                    }
                    Ok(_) => {}
                    Err(_) => broken = true,
                }
                result
            },
        );

        let mut outcome = Ok(());
        for bar in &bars {
            match self.assemble(bar, Utc::now()) {
                Ok(Some(snapshot)) => {
                    report.snapshots += 1;
                    writer.push(snapshot);
                }
                Ok(None) => {
                    debug!(symbol, ts_ms = bar.ts_ms, "skipping bar outside the calendar range");
                    report.skipped += 1;
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        let (_, stats) = writer.finish();
        report.written = stats.written;
        report.failed_flushes = stats.failed_flushes;

        if let Some(mark) = durable {
            if record.watermark.map_or(true, |before| mark > before) {
                self.store.set_watermark(symbol, mark)?;
                report.watermark_after = Some(mark);
            }
        }
        if report.failed_flushes > 0 {
            warn!(
                symbol,
                failed_flushes = report.failed_flushes,
                watermark = ?report.watermark_after,
                "watermark held at last durable snapshot"
            );
        }
        outcome?;

        info!(
            symbol,
            bars = report.bars,
            snapshots = report.snapshots,
            written = report.written,
            watermark = ?report.watermark_after,
            "snapshots built"
        );
        Ok(report)
    }

    /// Build symbols one after another. A failed symbol does not stop the
    /// run.
    pub fn run(&self, symbols: &[SymbolRecord], now: DateTime<Utc>) -> RunSummary<SnapshotReport> {
        let mut summary = RunSummary::default();
        for record in symbols {
            let result = self.build_symbol(record, now);
            if let Err(e) = &result {
                error!(symbol = %record.symbol, error = %e, "snapshot build aborted");
            }
            summary.record(&record.symbol, result);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use snapshot_core::{Document, MemoryStore, MINUTE_MS};

    const T0: i64 = 1_704_067_200_000;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(T0 + 24 * 3_600_000).unwrap()
    }

    fn registered(symbol: &str, watermark: Option<i64>) -> SymbolRecord {
        SymbolRecord {
            symbol: symbol.to_string(),
            watermark,
        }
    }

    fn seed_bars(store: &MemoryStore, n: i64) {
        let docs = (0..n)
            .map(|i| {
                doc(json!({
                    "t": T0 + i * MINUTE_MS,
                    "o": 10.0, "h": 10.5, "l": 9.5, "c": 10.0 + i as f64 * 0.1, "v": 100,
                }))
            })
            .collect();
        store.insert_bars("AAPL", docs).unwrap();
    }

    #[test]
    fn test_assemble_merges_all_sources() {
        let store = MemoryStore::new();
        store
            .insert_bars(
                "AAPL",
                vec![doc(json!({"t": T0, "c": 10.0, "volume": 150, "sma20": 9.9, "rsi14": 55.0}))],
            )
            .unwrap();
        store
            .insert_quotes(
                "AAPL",
                vec![
                    doc(json!({"t": T0 + 1_000, "bp": 9.99, "ap": 10.01})),
                    doc(json!({"t": T0 + 31_000, "bp": 10.0, "ap": 10.04})),
                ],
            )
            .unwrap();
        store
            .insert_trades(
                "AAPL",
                vec![
                    doc(json!({"t": T0 + 2_000, "p": 10.0, "s": 100})),
                    doc(json!({"t": T0 + 40_000, "p": 10.2, "s": 50})),
                ],
            )
            .unwrap();

        let config = PipelineConfig::default();
        let assembler = SnapshotAssembler::new(&store, &config);
        let bar = &store.bars("AAPL", TimeRange::new(T0, T0 + 1)).unwrap()[0];
        let snapshot = assembler.assemble(bar, now()).unwrap().unwrap();

        assert_eq!(snapshot.ts_ms(), T0);
        assert_eq!(snapshot.bar.close, Some(10.0));
        assert_eq!(snapshot.bar.volume, Some(150.0));
        assert_eq!(snapshot.indicators.rsi14, Some(55.0));
        assert_eq!(snapshot.indicators.macd, None);
        assert_eq!(snapshot.nbbo.quote_count, 2);
        assert_relative_eq!(snapshot.nbbo.spread_close.unwrap(), 0.04, epsilon = 1e-9);
        assert_eq!(snapshot.trades.trades_exec_count, 2);
        assert_relative_eq!(snapshot.trades.vwap_exec.unwrap(), 10.0667, epsilon = 1e-4);

        let stored = snapshot.to_document().unwrap();
        assert!(!stored.contains_key("macd"));
        assert_eq!(stored["bid_open"], json!(9.99));
        assert_eq!(stored["sma20"], json!(9.9));
    }

    #[test]
    fn test_build_advances_watermark_to_last_bar() {
        let store = MemoryStore::new();
        seed_bars(&store, 12);
        let config = PipelineConfig {
            snapshot_batch_size: 5,
            ..Default::default()
        };
        let assembler = SnapshotAssembler::new(&store, &config);

        let report = assembler.build_symbol(&registered("AAPL", None), now()).unwrap();
        assert_eq!(report.bars, 12);
        assert_eq!(report.snapshots, 12);
        assert_eq!(report.written, 12);
        assert_eq!(report.watermark_after, Some(T0 + 11 * MINUTE_MS));
        assert_eq!(store.symbols().unwrap()[0].watermark, Some(T0 + 11 * MINUTE_MS));
        assert_eq!(store.snapshots("AAPL", None).unwrap().len(), 12);
    }

    #[test]
    fn test_zero_bars_is_a_noop() {
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let assembler = SnapshotAssembler::new(&store, &config);

        let report = assembler
            .build_symbol(&registered("AAPL", Some(T0)), now())
            .unwrap();
        assert_eq!(report.bars, 0);
        assert_eq!(report.watermark_after, Some(T0));
        assert!(store.symbols().unwrap().is_empty());
    }

    #[test]
    fn test_incremental_run_skips_built_bars() {
        let store = MemoryStore::new();
        seed_bars(&store, 10);
        let config = PipelineConfig::default();
        let assembler = SnapshotAssembler::new(&store, &config);

        let report = assembler
            .build_symbol(&registered("AAPL", Some(T0 + 6 * MINUTE_MS)), now())
            .unwrap();
        assert_eq!(report.bars, 3);
        assert_eq!(report.watermark_before, Some(T0 + 6 * MINUTE_MS));
        assert_eq!(report.watermark_after, Some(T0 + 9 * MINUTE_MS));
    }

    #[test]
    fn test_explicit_since_never_regresses_watermark() {
        let store = MemoryStore::new();
        seed_bars(&store, 10);
        let config = PipelineConfig {
            since: Some(Utc.timestamp_millis_opt(T0).unwrap()),
            until: Some(Utc.timestamp_millis_opt(T0 + 3 * MINUTE_MS).unwrap()),
            ..Default::default()
        };
        let assembler = SnapshotAssembler::new(&store, &config);

        let report = assembler
            .build_symbol(&registered("AAPL", Some(T0 + 9 * MINUTE_MS)), now())
            .unwrap();
        assert_eq!(report.snapshots, 3);
        assert_eq!(report.watermark_after, Some(T0 + 9 * MINUTE_MS));
    }
}
