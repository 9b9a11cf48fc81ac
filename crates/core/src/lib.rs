//! Core types and shared plumbing for the snapshot pipeline.
//!
//! This crate provides what every other crate builds on:
//! - Market data records (bars, quotes, trades) and derived outputs
//! - Schema-tolerant field extraction
//! - The store interface plus an in-memory implementation
//! - Bounded batch writing
//! - Configuration and common error types

pub mod batch;
pub mod config;
pub mod error;
pub mod memory;
pub mod normalizer;
pub mod report;
pub mod store;
pub mod types;

pub use batch::{BatchStats, BatchWriter, FlushOutcome};
pub use config::{JoinConfig, PipelineConfig};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use normalizer::Field;
pub use report::RunSummary;
pub use store::MarketStore;
pub use types::*;
