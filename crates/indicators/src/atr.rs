//! Average True Range with Wilder smoothing.

use crate::set::BarInput;
use crate::{true_range, wilder, Indicator};

/// Wilder ATR. The first value is the mean true range of the first
/// `period` bars; the first bar's true range is its high-low range.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    seen: usize,
    tr_sum: f64,
    value: Option<f64>,
}

impl Atr {
    /// Create a new ATR. `period` must be > 0.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ATR period must be > 0");
        Self {
            period,
            prev_close: None,
            seen: 0,
            tr_sum: 0.0,
            value: None,
        }
    }
}

impl Indicator for Atr {
    type Input = BarInput;
    type Output = f64;

    fn warmup(&self) -> usize {
        self.period
    }

    fn advance(mut self, bar: BarInput) -> (Self, Option<f64>) {
        let tr = true_range(bar.high, bar.low, self.prev_close);
        self.prev_close = Some(bar.close);

        self.value = match self.value {
            Some(prev) => Some(wilder(prev, tr, self.period)),
            None => {
                self.seen += 1;
                self.tr_sum += tr;
                (self.seen == self.period).then(|| self.tr_sum / self.period as f64)
            }
        };
        let out = self.value;
        (self, out)
    }
}
