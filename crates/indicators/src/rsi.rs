//! Relative Strength Index with Wilder smoothing.
//!
//! The first average gain/loss is the simple mean of the first `period`
//! price changes; after that each average is Wilder-smoothed. Needs
//! `period + 1` closes for the first value.

use crate::{wilder, Indicator};

/// Wilder RSI.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    gain_sum: f64,
    loss_sum: f64,
    averages: Option<(f64, f64)>,
}

impl Rsi {
    /// Create a new RSI. `period` must be > 0.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "RSI period must be > 0");
        Self {
            period,
            prev_close: None,
            changes: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            averages: None,
        }
    }

    fn value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        }
    }
}

impl Indicator for Rsi {
    type Input = f64;
    type Output = f64;

    fn warmup(&self) -> usize {
        self.period + 1
    }

    fn advance(mut self, close: f64) -> (Self, Option<f64>) {
        let Some(prev) = self.prev_close.replace(close) else {
            return (self, None);
        };
        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        self.averages = match self.averages {
            Some((g, l)) => Some((wilder(g, gain, self.period), wilder(l, loss, self.period))),
            None => {
                self.changes += 1;
                self.gain_sum += gain;
                self.loss_sum += loss;
                (self.changes == self.period).then(|| {
                    let p = self.period as f64;
                    (self.gain_sum / p, self.loss_sum / p)
                })
            }
        };
        let out = self.averages.map(|(g, l)| Self::value(g, l));
        (self, out)
    }
}
