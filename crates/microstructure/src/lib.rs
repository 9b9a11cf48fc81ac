//! Per-interval market microstructure for the snapshot pipeline.
//!
//! This crate handles:
//! - NBBO resolution at interval open and close, with neighbour fallbacks
//! - Time-weighted average spread across an interval
//! - Trade aggregation (count, dollar volume, VWAP, average size)

pub mod nbbo;
pub mod trades;

pub use nbbo::{time_weighted_spread, NbboResolver, Side, SpreadWalk, Strategy};
pub use trades::{summarize, TradeAggregator};
