//! Snapshot building and job orchestration.
//!
//! This crate provides:
//! - Per-symbol snapshot windows (explicit, watermark, lookback)
//! - Snapshot assembly from bars, NBBO context and trade statistics
//! - Sequential and concurrent runners over the symbol registry
//! - A JSON-lines printer for stored documents

pub mod assembler;
pub mod dump;
pub mod runner;
pub mod window;

pub use assembler::{SnapshotAssembler, SnapshotReport};
pub use dump::{dump, Collection};
pub use runner::{run, run_concurrent, run_symbol, selected_symbols, SymbolOutcome};
pub use window::{SnapshotWindow, WindowStart};
