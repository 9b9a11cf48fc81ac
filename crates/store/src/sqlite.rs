//! SQLite implementation of `MarketStore`.
//!
//! One connection behind a mutex. Every bulk call runs in a single
//! transaction, so a failed batch leaves nothing half-written.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use snapshot_core::normalizer;
use snapshot_core::{
    BarUpdate, Document, Error, MarketStore, Record, Result, Snapshot, SymbolRecord, TimeRange,
    TimestampMs,
};
use tracing::{debug, info};

use crate::schema::{TickTable, PRAGMAS, SCHEMA};

fn sql(e: rusqlite::Error) -> Error {
    Error::store(format!("sqlite: {e}"))
}

/// SQLite-backed market store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(sql)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(sql)?;
        info!(path = %path.display(), "opened sqlite store");
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(sql)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(PRAGMAS).map_err(sql)?;
        conn.execute_batch(SCHEMA).map_err(sql)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::store("sqlite connection lock poisoned"))
    }

    fn range_query(&self, table: &str, symbol: &str, range: TimeRange) -> Result<Vec<Record>> {
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        let order = if table == "bars" { "ts" } else { "ts, id" };
        let query = format!(
            "SELECT ts, doc FROM {table} WHERE symbol = ?1 AND ts >= ?2 AND ts < ?3 ORDER BY {order}"
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&query).map_err(sql)?;
        let rows = stmt
            .query_map(params![symbol, range.start, range.end], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(sql)?;
        collect_records(symbol, rows)
    }

    fn insert_ticks(&self, table: TickTable, symbol: &str, docs: Vec<Document>) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql)?;
        let inserted = {
            let query = format!(
                "INSERT INTO {} (symbol, ts, doc) VALUES (?1, ?2, ?3)",
                table.name()
            );
            let mut stmt = tx.prepare_cached(&query).map_err(sql)?;
            let mut inserted = 0;
            for doc in &docs {
                let Some(ts) = normalizer::timestamp(doc) else {
                    debug!(symbol, table = table.name(), "rejecting record without timestamp");
                    continue;
                };
                stmt.execute(params![symbol, ts, serde_json::to_string(doc)?])
                    .map_err(sql)?;
                inserted += 1;
            }
            inserted
        };
        tx.commit().map_err(sql)?;
        Ok(inserted)
    }
}

fn collect_records(
    symbol: &str,
    rows: impl Iterator<Item = rusqlite::Result<(i64, String)>>,
) -> Result<Vec<Record>> {
    rows.map(|row| {
        let (ts_ms, text) = row.map_err(sql)?;
        Ok(Record {
            symbol: symbol.to_string(),
            ts_ms,
            doc: serde_json::from_str(&text)?,
        })
    })
    .collect()
}

fn update_bar(tx: &Transaction<'_>, update: &BarUpdate) -> Result<bool> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT doc FROM bars WHERE symbol = ?1 AND ts = ?2",
            params![update.symbol, update.ts_ms],
            |row| row.get(0),
        )
        .optional()
        .map_err(sql)?;
    let Some(text) = existing else {
        return Ok(false);
    };
    let mut doc: Document = serde_json::from_str(&text)?;
    update.values.apply_to(&mut doc);
    tx.execute(
        "UPDATE bars SET doc = ?3 WHERE symbol = ?1 AND ts = ?2",
        params![update.symbol, update.ts_ms, serde_json::to_string(&doc)?],
    )
    .map_err(sql)?;
    Ok(true)
}

impl MarketStore for SqliteStore {
    fn symbols(&self) -> Result<Vec<SymbolRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("SELECT symbol, watermark FROM symbols ORDER BY symbol")
            .map_err(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SymbolRecord {
                    symbol: row.get(0)?,
                    watermark: row.get(1)?,
                })
            })
            .map_err(sql)?;
        rows.map(|r| r.map_err(sql)).collect()
    }

    fn register_symbol(&self, symbol: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO symbols (symbol) VALUES (?1) ON CONFLICT(symbol) DO NOTHING",
                params![symbol],
            )
            .map_err(sql)?;
        Ok(())
    }

    fn set_watermark(&self, symbol: &str, ts_ms: TimestampMs) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO symbols (symbol, watermark) VALUES (?1, ?2)
                 ON CONFLICT(symbol) DO UPDATE SET watermark = excluded.watermark",
                params![symbol, ts_ms],
            )
            .map_err(sql)?;
        Ok(())
    }

    fn bars(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>> {
        self.range_query("bars", symbol, range)
    }

    fn quotes(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>> {
        self.range_query(TickTable::Quotes.name(), symbol, range)
    }

    fn quotes_before(&self, symbol: &str, ts_ms: TimestampMs, limit: usize) -> Result<Vec<Record>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT ts, doc FROM quotes WHERE symbol = ?1 AND ts < ?2
                 ORDER BY ts DESC, id DESC LIMIT ?3",
            )
            .map_err(sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![symbol, ts_ms, limit], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(sql)?;
        collect_records(symbol, rows)
    }

    fn quotes_from(&self, symbol: &str, ts_ms: TimestampMs, limit: usize) -> Result<Vec<Record>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT ts, doc FROM quotes WHERE symbol = ?1 AND ts >= ?2
                 ORDER BY ts, id LIMIT ?3",
            )
            .map_err(sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![symbol, ts_ms, limit], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(sql)?;
        collect_records(symbol, rows)
    }

    fn trades(&self, symbol: &str, range: TimeRange) -> Result<Vec<Record>> {
        self.range_query(TickTable::Trades.name(), symbol, range)
    }

    fn snapshots(&self, symbol: &str, limit: Option<usize>) -> Result<Vec<Snapshot>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("SELECT doc FROM snapshots WHERE symbol = ?1 ORDER BY ts LIMIT ?2")
            .map_err(sql)?;
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = stmt
            .query_map(params![symbol, limit], |row| row.get::<_, String>(0))
            .map_err(sql)?;
        rows.map(|row| {
            let text = row.map_err(sql)?;
            Ok(serde_json::from_str(&text)?)
        })
        .collect()
    }

    fn insert_bars(&self, symbol: &str, docs: Vec<Document>) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql)?;
        let inserted = {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO bars (symbol, ts, doc) VALUES (?1, ?2, ?3)
                     ON CONFLICT(symbol, ts) DO UPDATE SET doc = excluded.doc",
                )
                .map_err(sql)?;
            let mut inserted = 0;
            for doc in &docs {
                let Some(ts) = normalizer::timestamp(doc) else {
                    debug!(symbol, "rejecting bar without timestamp");
                    continue;
                };
                stmt.execute(params![symbol, ts, serde_json::to_string(doc)?])
                    .map_err(sql)?;
                inserted += 1;
            }
            inserted
        };
        tx.commit().map_err(sql)?;
        Ok(inserted)
    }

    fn insert_quotes(&self, symbol: &str, docs: Vec<Document>) -> Result<usize> {
        self.insert_ticks(TickTable::Quotes, symbol, docs)
    }

    fn insert_trades(&self, symbol: &str, docs: Vec<Document>) -> Result<usize> {
        self.insert_ticks(TickTable::Trades, symbol, docs)
    }

    fn update_bars(&self, updates: &[BarUpdate]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql)?;
        let mut matched = 0;
        for update in updates {
            if update_bar(&tx, update)? {
                matched += 1;
            }
        }
        tx.commit().map_err(sql)?;
        Ok(matched)
    }

    fn upsert_snapshots(&self, snapshots: &[Snapshot]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql)?;
        {
            // Last write wins by receipt time.
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO snapshots (symbol, ts, received_at, doc) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(symbol, ts) DO UPDATE
                        SET received_at = excluded.received_at, doc = excluded.doc
                        WHERE excluded.received_at >= snapshots.received_at",
                )
                .map_err(sql)?;
            for snapshot in snapshots {
                let doc = serde_json::to_string(&snapshot.to_document()?)?;
                stmt.execute(params![
                    snapshot.symbol,
                    snapshot.ts_ms(),
                    snapshot.received_at.timestamp_millis(),
                    doc
                ])
                .map_err(sql)?;
            }
        }
        tx.commit().map_err(sql)?;
        Ok(snapshots.len())
    }
}
