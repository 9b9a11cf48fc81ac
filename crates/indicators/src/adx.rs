//! Average Directional Index with the +DI/-DI lines.
//!
//! Directional movement needs a previous bar, so the first bar only
//! primes the state. True range and ±DM are Wilder-smoothed sums seeded
//! from the first `period` movements, which makes ±DI available from bar
//! `period + 1`. ADX is the mean of the first `period` DX values and is
//! Wilder-smoothed afterwards, first available at bar `2 * period`.

use crate::set::BarInput;
use crate::{true_range, wilder, Indicator};

/// ADX output for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxOutput {
    pub plus_di: f64,
    pub minus_di: f64,
    pub adx: Option<f64>,
}

/// Wilder ADX/DMI.
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev: Option<BarInput>,
    moves: usize,
    tr_s: f64,
    plus_dm_s: f64,
    minus_dm_s: f64,
    dx_count: usize,
    dx_sum: f64,
    adx: Option<f64>,
}

impl Adx {
    /// Create a new ADX. `period` must be > 0.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ADX period must be > 0");
        Self {
            period,
            prev: None,
            moves: 0,
            tr_s: 0.0,
            plus_dm_s: 0.0,
            minus_dm_s: 0.0,
            dx_count: 0,
            dx_sum: 0.0,
            adx: None,
        }
    }

    /// Bars needed before ±DI exist.
    pub fn di_warmup(&self) -> usize {
        self.period + 1
    }

    fn directional_movement(prev: &BarInput, bar: &BarInput) -> (f64, f64) {
        let up = bar.high - prev.high;
        let down = prev.low - bar.low;
        let plus = if up > down && up > 0.0 { up } else { 0.0 };
        let minus = if down > up && down > 0.0 { down } else { 0.0 };
        (plus, minus)
    }
}

impl Indicator for Adx {
    type Input = BarInput;
    type Output = AdxOutput;

    fn warmup(&self) -> usize {
        2 * self.period
    }

    fn advance(mut self, bar: BarInput) -> (Self, Option<AdxOutput>) {
        let Some(prev) = self.prev.replace(bar) else {
            return (self, None);
        };
        let (plus_dm, minus_dm) = Self::directional_movement(&prev, &bar);
        let tr = true_range(bar.high, bar.low, Some(prev.close));
        let p = self.period as f64;

        if self.moves < self.period {
            self.moves += 1;
            self.tr_s += tr;
            self.plus_dm_s += plus_dm;
            self.minus_dm_s += minus_dm;
            if self.moves < self.period {
                return (self, None);
            }
        } else {
            self.tr_s = self.tr_s - self.tr_s / p + tr;
            self.plus_dm_s = self.plus_dm_s - self.plus_dm_s / p + plus_dm;
            self.minus_dm_s = self.minus_dm_s - self.minus_dm_s / p + minus_dm;
        }

        let (plus_di, minus_di) = if self.tr_s > 0.0 {
            (100.0 * self.plus_dm_s / self.tr_s, 100.0 * self.minus_dm_s / self.tr_s)
        } else {
            (0.0, 0.0)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };

        self.adx = match self.adx {
            Some(prev_adx) => Some(wilder(prev_adx, dx, self.period)),
            None => {
                self.dx_count += 1;
                self.dx_sum += dx;
                (self.dx_count == self.period).then(|| self.dx_sum / p)
            }
        };

        let out = AdxOutput {
            plus_di,
            minus_di,
            adx: self.adx,
        };
        (self, Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trending(n: usize) -> Vec<BarInput> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                BarInput {
                    high: base + 1.0,
                    low: base - 1.0,
                    close: base + 0.5,
                }
            })
            .collect()
    }

    #[test]
    fn test_warmups() {
        let mut adx = Adx::new(14);
        assert_eq!(adx.di_warmup(), 15);
        assert_eq!(adx.warmup(), 28);

        for (i, bar) in trending(40).into_iter().enumerate() {
            let n = i + 1;
            let (next, out) = adx.advance(bar);
            adx = next;
            if n < 15 {
                assert!(out.is_none(), "bar {n}");
            } else {
                let out = out.unwrap();
                assert_eq!(out.adx.is_some(), n >= 28, "bar {n}");
            }
        }
    }

    #[test]
    fn test_steady_uptrend() {
        let mut adx = Adx::new(5);
        let mut last = None;
        for bar in trending(30) {
            let (next, out) = adx.advance(bar);
            adx = next;
            last = out;
        }
        let last = last.unwrap();
        // Every bar moves up by 1 with range 2: +DM = 1, -DM = 0, TR = 2.
        assert_relative_eq!(last.plus_di, 50.0, epsilon = 1e-9);
        assert_relative_eq!(last.minus_di, 0.0, epsilon = 1e-9);
        assert_relative_eq!(last.adx.unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_directional_movement_rules() {
        let prev = BarInput { high: 10.0, low: 8.0, close: 9.0 };
        // Inside bar: no movement either way.
        let inside = BarInput { high: 9.5, low: 8.5, close: 9.0 };
        assert_eq!(Adx::directional_movement(&prev, &inside), (0.0, 0.0));
        // Outside bar with the larger move down.
        let outside = BarInput { high: 10.5, low: 6.0, close: 7.0 };
        assert_eq!(Adx::directional_movement(&prev, &outside), (0.0, 2.0));
    }
}
