//! Bollinger Bands.
//!
//! Middle band is the SMA of the window; the bands sit `k` population
//! standard deviations away. Running sums keep each step O(1).

use std::collections::VecDeque;

use crate::Indicator;

/// Band values for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger Bands(period, k).
#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    k: f64,
    window: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
}

impl Bollinger {
    /// Create new bands. `period` must be > 0.
    pub fn new(period: usize, k: f64) -> Self {
        assert!(period > 0, "Bollinger period must be > 0");
        Self {
            period,
            k,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
            sum_sq: 0.0,
        }
    }
}

impl Default for Bollinger {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

impl Indicator for Bollinger {
    type Input = f64;
    type Output = BollingerOutput;

    fn warmup(&self) -> usize {
        self.period
    }

    fn advance(mut self, close: f64) -> (Self, Option<BollingerOutput>) {
        self.window.push_back(close);
        self.sum += close;
        self.sum_sq += close * close;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }
        if self.window.len() < self.period {
            return (self, None);
        }

        let n = self.period as f64;
        let mean = self.sum / n;
        // Handle numerical issues
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        let width = self.k * variance.sqrt();
        let out = BollingerOutput {
            upper: mean + width,
            middle: mean,
            lower: mean - width,
        };
        (self, Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_bands() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population std 2.
        let mut bands = Bollinger::new(8, 2.0);
        let mut last = None;
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            let (next, out) = bands.advance(v);
            bands = next;
            last = out;
        }
        let last = last.unwrap();
        assert_relative_eq!(last.middle, 5.0, epsilon = 1e-9);
        assert_relative_eq!(last.upper, 9.0, epsilon = 1e-9);
        assert_relative_eq!(last.lower, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_window_collapses() {
        let mut bands = Bollinger::default();
        let mut outputs = Vec::new();
        for _ in 0..25 {
            let (next, out) = bands.advance(42.0);
            bands = next;
            outputs.push(out);
        }
        assert!(outputs[..19].iter().all(Option::is_none));
        let last = outputs[24].unwrap();
        assert_relative_eq!(last.upper, 42.0, epsilon = 1e-6);
        assert_relative_eq!(last.lower, 42.0, epsilon = 1e-6);
    }
}
