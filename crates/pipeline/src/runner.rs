//! Job orchestration across symbols.
//!
//! Each symbol runs indicator enrichment and then snapshot assembly,
//! start to finish, on one worker. Symbols are independent, so they may
//! run concurrently up to the configured worker count.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use snapshot_core::{Error, MarketStore, PipelineConfig, Result, RunSummary, SymbolRecord};
use snapshot_indicators::{IndicatorEngine, IndicatorReport};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::assembler::{SnapshotAssembler, SnapshotReport};

/// Both job reports for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolOutcome {
    pub indicators: IndicatorReport,
    pub snapshots: SnapshotReport,
}

/// Registered symbols that pass the configured allow-list.
pub fn selected_symbols<S: MarketStore + ?Sized>(
    store: &S,
    config: &PipelineConfig,
) -> Result<Vec<SymbolRecord>> {
    Ok(store
        .symbols()?
        .into_iter()
        .filter(|record| config.wants_symbol(&record.symbol))
        .collect())
}

/// Enrich then snapshot one symbol.
pub fn run_symbol<S: MarketStore + ?Sized>(
    store: &S,
    config: &PipelineConfig,
    record: &SymbolRecord,
    now: DateTime<Utc>,
) -> Result<SymbolOutcome> {
    let indicators = IndicatorEngine::new(store, config).enrich_symbol(&record.symbol)?;
    let snapshots = SnapshotAssembler::new(store, config).build_symbol(record, now)?;
    Ok(SymbolOutcome {
        indicators,
        snapshots,
    })
}

/// Run every selected symbol in turn.
///
/// Only a failure to read the symbol registry fails the run; per-symbol
/// errors are logged and collected.
pub fn run<S: MarketStore + ?Sized>(
    store: &S,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<RunSummary<SymbolOutcome>> {
    let symbols = selected_symbols(store, config)?;
    let mut summary = RunSummary::default();
    for record in &symbols {
        let result = run_symbol(store, config, record, now);
        if let Err(e) = &result {
            error!(symbol = %record.symbol, error = %e, "symbol aborted");
        }
        summary.record(&record.symbol, result);
    }
    log_summary(&summary);
    Ok(summary)
}

/// Run selected symbols on blocking workers, at most `workers` at once.
///
/// Results are reported in registry order.
pub async fn run_concurrent<S>(
    store: Arc<S>,
    config: Arc<PipelineConfig>,
    now: DateTime<Utc>,
) -> Result<RunSummary<SymbolOutcome>>
where
    S: MarketStore + 'static,
{
    let symbols = selected_symbols(store.as_ref(), &config)?;
    let workers = config.worker_count();
    let permits = Arc::new(Semaphore::new(workers));
    info!(symbols = symbols.len(), workers, "starting run");

    let mut handles = Vec::with_capacity(symbols.len());
    for record in symbols {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::other(format!("worker pool closed: {e}")))?;
        let store = Arc::clone(&store);
        let config = Arc::clone(&config);
        let symbol = record.symbol.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            run_symbol(store.as_ref(), &config, &record, now)
        });
        handles.push((symbol, handle));
    }

    let mut summary = RunSummary::default();
    for (symbol, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::other(format!("worker panicked: {e}"))),
        };
        if let Err(e) = &result {
            error!(symbol = %symbol, error = %e, "symbol aborted");
        }
        summary.record(&symbol, result);
    }
    log_summary(&summary);
    Ok(summary)
}

fn log_summary(summary: &RunSummary<SymbolOutcome>) {
    let snapshots: usize = summary
        .completed
        .iter()
        .map(|outcome| outcome.snapshots.written)
        .sum();
    let bars: usize = summary
        .completed
        .iter()
        .map(|outcome| outcome.indicators.written)
        .sum();
    info!(
        completed = summary.completed.len(),
        failed = summary.failed.len(),
        bars_enriched = bars,
        snapshots_written = snapshots,
        "run finished"
    );
}
