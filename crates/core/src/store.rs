//! Store interface shared by the enrichment and snapshot jobs.
//!
//! Every collection is keyed by `(symbol, ts_ms)`. Range reads are
//! half-open and ascending; the nearest-neighbour reads used by the join
//! fallbacks return records ordered by distance from the boundary.

use crate::error::Result;
use crate::types::{BarUpdate, Document, Record, Snapshot, SymbolRecord, TimeRange, TimestampMs};

/// Time-indexed record store for bars, quotes, trades and snapshots.
pub trait MarketStore: Send + Sync {
    // Registry

    /// All registered symbols with their watermarks.
    fn symbols(&self) -> Result<Vec<SymbolRecord>>;

    /// Register a symbol (no-op if already registered).
    fn register_symbol(&self, symbol: &str) -> Result<()>;

    /// Persist a symbol's snapshot watermark.
    fn set_watermark(&self, symbol: &str, ts_ms: TimestampMs) -> Result<()>;

    // Reads

    /// Bars with timestamp in `range`, ascending.
    fn bars(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>>;

    /// Quotes with timestamp in `range`, ascending.
    fn quotes(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>>;

    /// Up to `limit` quotes strictly before `ts_ms`, nearest first.
    fn quotes_before(&self, symbol: &str, ts_ms: TimestampMs, limit: usize)
        -> Result<Vec<Record>>;

    /// Up to `limit` quotes at or after `ts_ms`, nearest first.
    fn quotes_from(&self, symbol: &str, ts_ms: TimestampMs, limit: usize) -> Result<Vec<Record>>;

    /// Trades with timestamp in `range`, ascending.
    fn trades(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>>;

    /// Stored snapshots for a symbol, ascending, at most `limit`.
    fn snapshots(&self, symbol: &str, limit: Option<usize>) -> Result<Vec<Snapshot>>;

    // Writes

    /// Insert raw bar documents; returns how many carried a usable timestamp.
    fn insert_bars(&self, symbol: &str, docs: Vec<Document>) -> Result<usize>;

    /// Append raw quote documents.
    fn insert_quotes(&self, symbol: &str, docs: Vec<Document>) -> Result<usize>;

    /// Append raw trade documents.
    fn insert_trades(&self, symbol: &str, docs: Vec<Document>) -> Result<usize>;

    /// Set indicator fields on existing bars. Returns bars matched.
    fn update_bars(&self, updates: &[BarUpdate]) -> Result<usize>;

    /// Insert or overwrite snapshots keyed by `(symbol, t)`.
    fn upsert_snapshots(&self, snapshots: &[Snapshot]) -> Result<usize>;
}

/// All bars of a symbol regardless of time.
pub fn full_history() -> TimeRange {
    TimeRange::new(TimestampMs::MIN, TimestampMs::MAX)
}
