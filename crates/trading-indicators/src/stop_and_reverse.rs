//! Parabolic stop-and-reverse (SAR).
//!
//! Fed one (high, low) pair per period. Reports when the trend flips.

use serde::{Deserialize, Serialize};

/// Trend direction tracked by the SAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy)]
enum Setup {
    /// No period seen yet.
    Empty,
    /// One period seen, its extremes stored as the previous high/low.
    FirstPeriod,
    Ready,
}

/// Parabolic SAR trend-reversal tracker.
#[derive(Debug, Clone)]
pub struct ParabolicSar {
    initial_af: f64,
    max_af: f64,
    af: f64,
    setup: Setup,
    sar: f64,
    trend: Trend,
    /// Highest high of the current bullish run.
    high_point: f64,
    /// Lowest low of the current bearish run.
    low_point: f64,
    prev_high: f64,
    prev_prev_high: f64,
    prev_low: f64,
    prev_prev_low: f64,
}

impl Default for ParabolicSar {
    fn default() -> Self {
        Self::new(0.02, 0.2)
    }
}

impl ParabolicSar {
    /// Create a new SAR with the given acceleration step and cap.
    pub fn new(acceleration_factor: f64, max_acceleration_factor: f64) -> Self {
        assert!(
            acceleration_factor > 0.0 && acceleration_factor <= max_acceleration_factor,
            "Acceleration factor must be positive and not exceed the maximum"
        );
        Self {
            initial_af: acceleration_factor,
            max_af: max_acceleration_factor,
            af: acceleration_factor,
            setup: Setup::Empty,
            sar: 0.0,
            trend: Trend::Bullish,
            high_point: f64::INFINITY,
            low_point: 0.0,
            prev_high: 0.0,
            prev_prev_high: 0.0,
            prev_low: f64::INFINITY,
            prev_prev_low: f64::INFINITY,
        }
    }

    /// Whether two periods have been seen and the SAR is tracking.
    pub fn is_set_up(&self) -> bool {
        matches!(self.setup, Setup::Ready)
    }

    /// Current SAR value, once set up.
    pub fn value(&self) -> Option<f64> {
        self.is_set_up().then_some(self.sar)
    }

    /// Current trend, once set up.
    pub fn trend(&self) -> Option<Trend> {
        self.is_set_up().then_some(self.trend)
    }

    /// Current acceleration factor.
    pub fn acceleration_factor(&self) -> f64 {
        self.af
    }

    /// Feed one period's extremes.
    ///
    /// # Returns
    /// The new trend if it reversed this period, otherwise `None`. The two
    /// set-up periods never report a reversal.
    pub fn update(&mut self, high: f64, low: f64) -> Option<Trend> {
        match self.setup {
            Setup::Empty => {
                self.prev_high = high;
                self.prev_low = low;
                self.setup = Setup::FirstPeriod;
                return None;
            }
            Setup::FirstPeriod => {
                self.low_point = self.prev_low.min(low);
                self.high_point = self.prev_high.max(high);
                // Initial SAR is the low point of a rising market, the high point of a falling one
                if self.prev_high < high {
                    self.sar = self.low_point;
                    self.trend = Trend::Bullish;
                } else {
                    self.sar = self.high_point;
                    self.trend = Trend::Bearish;
                }
                self.setup = Setup::Ready;
                return None;
            }
            Setup::Ready => {}
        }

        self.sar = match self.trend {
            Trend::Bullish => self.sar + self.af * (self.high_point - self.sar),
            Trend::Bearish => self.sar + self.af * (self.low_point - self.sar),
        };

        let reversed = match self.trend {
            Trend::Bullish if low < self.sar => {
                self.trend = Trend::Bearish;
                self.sar = self.high_point;
                self.low_point = low;
                true
            }
            Trend::Bearish if high > self.sar => {
                self.trend = Trend::Bullish;
                self.sar = self.low_point;
                self.high_point = high;
                true
            }
            _ => false,
        };

        if reversed {
            self.af = self.initial_af;
        } else {
            match self.trend {
                Trend::Bullish => {
                    if high > self.high_point {
                        self.high_point = high;
                        self.af = (self.af + self.initial_af).min(self.max_af);
                    }
                    // SAR may not rise above the last two lows
                    self.sar = self.sar.min(self.prev_low).min(self.prev_prev_low);
                }
                Trend::Bearish => {
                    if low < self.low_point {
                        self.low_point = low;
                        self.af = (self.af + self.initial_af).min(self.max_af);
                    }
                    self.sar = self.sar.max(self.prev_high).max(self.prev_prev_high);
                }
            }
        }

        self.prev_prev_low = self.prev_low;
        self.prev_low = low;
        self.prev_prev_high = self.prev_high;
        self.prev_high = high;

        reversed.then_some(self.trend)
    }

    /// Reset the indicator state.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_af, self.max_af);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(sar: &mut ParabolicSar, from: f64, periods: usize) -> Vec<Option<Trend>> {
        (0..periods)
            .map(|i| {
                let base = from + i as f64;
                sar.update(base + 1.0, base)
            })
            .collect()
    }

    #[test]
    fn test_setup_takes_two_periods() {
        let mut sar = ParabolicSar::default();
        assert!(sar.update(10.0, 9.0).is_none());
        assert!(!sar.is_set_up());

        assert!(sar.update(11.0, 10.0).is_none());
        assert!(sar.is_set_up());
        assert_eq!(sar.trend(), Some(Trend::Bullish));
        // Rising market starts at the low point
        assert!((sar.value().unwrap() - 9.0).abs() < 1e-10);
    }

    #[test]
    fn test_falling_setup_is_bearish() {
        let mut sar = ParabolicSar::default();
        sar.update(11.0, 10.0);
        sar.update(10.0, 9.0);
        assert_eq!(sar.trend(), Some(Trend::Bearish));
        assert!((sar.value().unwrap() - 11.0).abs() < 1e-10);
    }

    #[test]
    fn test_uptrend_does_not_reverse() {
        let mut sar = ParabolicSar::default();
        let results = rising(&mut sar, 9.0, 12);
        assert!(results.iter().all(Option::is_none));
        assert_eq!(sar.trend(), Some(Trend::Bullish));
    }

    #[test]
    fn test_acceleration_is_capped() {
        let mut sar = ParabolicSar::new(0.02, 0.1);
        rising(&mut sar, 9.0, 30);
        assert!((sar.acceleration_factor() - 0.1).abs() < 1e-10);
    }

    #[test]
    fn test_crash_then_rally_reverses_both_ways() {
        let mut sar = ParabolicSar::default();
        rising(&mut sar, 9.0, 6);

        assert_eq!(sar.update(5.0, 4.0), Some(Trend::Bearish));
        assert!((sar.acceleration_factor() - 0.02).abs() < 1e-10);

        assert_eq!(sar.update(30.0, 29.0), Some(Trend::Bullish));
    }

    #[test]
    fn test_reset() {
        let mut sar = ParabolicSar::default();
        rising(&mut sar, 9.0, 4);
        sar.reset();
        assert!(!sar.is_set_up());
        assert!(sar.value().is_none());
    }
}
