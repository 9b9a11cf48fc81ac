//! Streaming technical indicators for the snapshot pipeline.
//!
//! This crate handles:
//! - Per-indicator state machines advanced once per bar (SMA, EMA, MACD,
//!   RSI, ATR, ADX/DMI, Bollinger Bands)
//! - The combined per-symbol indicator set
//! - The enrichment job that writes indicator fields back onto bars

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod engine;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod set;

pub use adx::{Adx, AdxOutput};
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerOutput};
pub use engine::{IndicatorEngine, IndicatorReport};
pub use macd::{Macd, MacdOutput};
pub use moving_average::{Ema, Sma};
pub use rsi::Rsi;
pub use set::{BarInput, IndicatorSet, WARMUPS};

/// A streaming indicator.
///
/// State is a plain value: `advance` consumes it together with one
/// observation and hands back the successor state plus the output for
/// that observation, which is `None` until the warm-up is consumed.
pub trait Indicator: Sized {
    /// One observation.
    type Input;
    /// Value produced per observation once warmed up.
    type Output;

    /// Observations needed before the first output.
    fn warmup(&self) -> usize;

    /// Consume one observation.
    fn advance(self, input: Self::Input) -> (Self, Option<Self::Output>);
}

/// True range of a bar given the previous close.
#[inline]
pub(crate) fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
        None => high - low,
    }
}

/// One step of Wilder smoothing of an average.
#[inline]
pub(crate) fn wilder(prev: f64, value: f64, period: usize) -> f64 {
    let p = period as f64;
    (prev * (p - 1.0) + value) / p
}
