//! Table definitions.
//!
//! Raw records keep their original JSON document next to the normalized
//! `(symbol, ts)` key. Quotes and trades can share a timestamp, so they
//! carry a rowid that preserves arrival order.

/// Connection-wide settings applied on open.
pub const PRAGMAS: &str = "
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
";

/// Idempotent schema creation.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS symbols (
    symbol      TEXT PRIMARY KEY,
    watermark   INTEGER
);

CREATE TABLE IF NOT EXISTS bars (
    symbol  TEXT    NOT NULL,
    ts      INTEGER NOT NULL,
    doc     TEXT    NOT NULL,
    PRIMARY KEY (symbol, ts)
);

CREATE TABLE IF NOT EXISTS quotes (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol  TEXT    NOT NULL,
    ts      INTEGER NOT NULL,
    doc     TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS quotes_symbol_ts ON quotes (symbol, ts, id);

CREATE TABLE IF NOT EXISTS trades (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol  TEXT    NOT NULL,
    ts      INTEGER NOT NULL,
    doc     TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS trades_symbol_ts ON trades (symbol, ts, id);

CREATE TABLE IF NOT EXISTS snapshots (
    symbol       TEXT    NOT NULL,
    ts           INTEGER NOT NULL,
    received_at  INTEGER NOT NULL,
    doc          TEXT    NOT NULL,
    PRIMARY KEY (symbol, ts)
);
";

/// Tables holding append-only tick records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTable {
    Quotes,
    Trades,
}

impl TickTable {
    pub fn name(self) -> &'static str {
        match self {
            TickTable::Quotes => "quotes",
            TickTable::Trades => "trades",
        }
    }
}
