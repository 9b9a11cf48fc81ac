//! Persistent storage for the snapshot pipeline.
//!
//! This crate handles:
//! - SQLite schema for bars, quotes, trades, snapshots and the symbol registry
//! - The `MarketStore` interface over a single SQLite connection

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;
