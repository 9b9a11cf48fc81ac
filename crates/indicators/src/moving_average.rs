//! Simple and exponential moving averages.

use std::collections::VecDeque;

use crate::Indicator;

/// Simple moving average over a fixed window.
///
/// Keeps a running sum so each step is O(1).
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    /// Create a new SMA. `period` must be > 0.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SMA period must be > 0");
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }
}

impl Indicator for Sma {
    type Input = f64;
    type Output = f64;

    fn warmup(&self) -> usize {
        self.period
    }

    fn advance(mut self, value: f64) -> (Self, Option<f64>) {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        let out = (self.window.len() == self.period).then(|| self.sum / self.period as f64);
        (self, out)
    }
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values, then `ema = (x - ema) * k + ema` with `k = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Ema {
    /// Create a new EMA. `period` must be > 0.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "EMA period must be > 0");
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seen: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    /// Current value, if seeded.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for Ema {
    type Input = f64;
    type Output = f64;

    fn warmup(&self) -> usize {
        self.period
    }

    fn advance(mut self, value: f64) -> (Self, Option<f64>) {
        self.value = match self.value {
            Some(prev) => Some((value - prev) * self.k + prev),
            None => {
                self.seen += 1;
                self.seed_sum += value;
                (self.seen == self.period).then(|| self.seed_sum / self.period as f64)
            }
        };
        let out = self.value;
        (self, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn run<I: Indicator<Input = f64>>(mut ind: I, values: &[f64]) -> Vec<Option<I::Output>> {
        let mut out = Vec::new();
        for &v in values {
            let (next, o) = ind.advance(v);
            ind = next;
            out.push(o);
        }
        out
    }

    #[test]
    fn test_sma_warmup_and_window() {
        let out = run(Sma::new(3), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 2.0);
        assert_relative_eq!(out[3].unwrap(), 3.0);
        assert_relative_eq!(out[4].unwrap(), 4.0);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        // k = 0.5; seed = (2 + 4 + 3) / 3 = 3; next = (6 - 3) * 0.5 + 3 = 4.5
        let out = run(Ema::new(3), &[2.0, 4.0, 3.0, 6.0]);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 3.0);
        assert_relative_eq!(out[3].unwrap(), 4.5);
    }

    #[test]
    fn test_ema_constant_series() {
        let out = run(Ema::new(5), &[7.0; 20]);
        for v in out.into_iter().skip(4) {
            assert_relative_eq!(v.unwrap(), 7.0);
        }
    }

    #[test]
    fn test_state_is_a_value() {
        let (sma, _) = Sma::new(2).advance(1.0);
        let fork = sma.clone();
        let (_, a) = sma.advance(3.0);
        let (_, b) = fork.advance(3.0);
        assert_eq!(a, b);
        assert_eq!(a, Some(2.0));
    }
}
