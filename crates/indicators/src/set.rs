//! The full indicator set advanced in lock-step per bar.

use snapshot_core::{Field, IndicatorValues, Record};

use crate::{Adx, Atr, Bollinger, Ema, Indicator, Macd, Rsi, Sma};

/// The price inputs every indicator reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarInput {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl BarInput {
    /// Extract high/low/close from a stored bar.
    ///
    /// Returns `None` if any of the three is missing or non-finite; such a
    /// bar must not touch indicator state.
    pub fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            high: record.number(Field::High)?,
            low: record.number(Field::Low)?,
            close: record.number(Field::Close)?,
        })
    }
}

/// Bars consumed before each stored field first appears.
pub const WARMUPS: [(&str, usize); 15] = [
    ("sma20", 20),
    ("sma50", 50),
    ("ema12", 12),
    ("ema26", 26),
    ("macd", 26),
    ("macdSignal", 34),
    ("macdHistogram", 34),
    ("rsi14", 15),
    ("atr14", 14),
    ("bollingerUpper", 20),
    ("bollingerMiddle", 20),
    ("bollingerLower", 20),
    ("adx14", 28),
    ("plusDmi14", 15),
    ("minusDmi14", 15),
];

/// Per-symbol indicator state.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    sma20: Sma,
    sma50: Sma,
    ema12: Ema,
    ema26: Ema,
    macd: Macd,
    rsi14: Rsi,
    atr14: Atr,
    bollinger: Bollinger,
    adx14: Adx,
}

impl Default for IndicatorSet {
    fn default() -> Self {
        Self {
            sma20: Sma::new(20),
            sma50: Sma::new(50),
            ema12: Ema::new(12),
            ema26: Ema::new(26),
            macd: Macd::new(12, 26, 9),
            rsi14: Rsi::new(14),
            atr14: Atr::new(14),
            bollinger: Bollinger::new(20, 2.0),
            adx14: Adx::new(14),
        }
    }
}

impl Indicator for IndicatorSet {
    type Input = BarInput;
    type Output = IndicatorValues;

    /// Longest warm-up in the set.
    fn warmup(&self) -> usize {
        WARMUPS.iter().map(|(_, w)| *w).max().unwrap_or(0)
    }

    /// Advance every indicator by one bar. Always yields a value set,
    /// possibly empty.
    fn advance(self, bar: BarInput) -> (Self, Option<IndicatorValues>) {
        let (sma20, sma20_v) = self.sma20.advance(bar.close);
        let (sma50, sma50_v) = self.sma50.advance(bar.close);
        let (ema12, ema12_v) = self.ema12.advance(bar.close);
        let (ema26, ema26_v) = self.ema26.advance(bar.close);
        let (macd, macd_v) = self.macd.advance(bar.close);
        let (rsi14, rsi_v) = self.rsi14.advance(bar.close);
        let (atr14, atr_v) = self.atr14.advance(bar);
        let (bollinger, bb_v) = self.bollinger.advance(bar.close);
        let (adx14, adx_v) = self.adx14.advance(bar);

        let values = IndicatorValues {
            sma20: sma20_v,
            sma50: sma50_v,
            ema12: ema12_v,
            ema26: ema26_v,
            macd: macd_v.map(|m| m.macd),
            macd_signal: macd_v.and_then(|m| m.signal),
            macd_histogram: macd_v.and_then(|m| m.histogram),
            rsi14: rsi_v,
            atr14: atr_v,
            bollinger_upper: bb_v.map(|b| b.upper),
            bollinger_middle: bb_v.map(|b| b.middle),
            bollinger_lower: bb_v.map(|b| b.lower),
            adx14: adx_v.and_then(|a| a.adx),
            plus_dmi14: adx_v.map(|a| a.plus_di),
            minus_dmi14: adx_v.map(|a| a.minus_di),
        };

        let next = Self {
            sma20,
            sma50,
            ema12,
            ema26,
            macd,
            rsi14,
            atr14,
            bollinger,
            adx14,
        };
        (next, Some(values))
    }
}
