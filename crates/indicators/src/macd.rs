//! MACD: fast EMA minus slow EMA, with an EMA signal line.

use crate::moving_average::Ema;
use crate::Indicator;

/// MACD output for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    /// Fast EMA minus slow EMA.
    pub macd: f64,
    /// EMA of the MACD line; absent until it has its own warm-up.
    pub signal: Option<f64>,
    /// `macd - signal`.
    pub histogram: Option<f64>,
}

/// MACD(fast, slow, signal).
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    /// Create a MACD with explicit periods.
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast < slow, "MACD fast period must be shorter than slow");
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            slow_period: slow,
            signal_period: signal,
        }
    }

    /// Bars needed before the signal line exists.
    pub fn signal_warmup(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    type Input = f64;
    type Output = MacdOutput;

    fn warmup(&self) -> usize {
        self.slow_period
    }

    fn advance(mut self, close: f64) -> (Self, Option<MacdOutput>) {
        let (fast, f) = self.fast.advance(close);
        let (slow, s) = self.slow.advance(close);
        self.fast = fast;
        self.slow = slow;

        let (Some(f), Some(s)) = (f, s) else {
            return (self, None);
        };
        let macd = f - s;
        let (signal_state, signal) = self.signal.advance(macd);
        self.signal = signal_state;

        let out = MacdOutput {
            macd,
            signal,
            histogram: signal.map(|sig| macd - sig),
        };
        (self, Some(out))
    }
}
