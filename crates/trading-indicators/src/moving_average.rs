//! Moving average indicators.

use trading_core::traits::StreamingIndicator;

/// Streaming Exponential Moving Average (EMA).
///
/// Gives more weight to recent prices using an exponential decay with
/// multiplier `2 / (period + 1)`. Unlike a warm-up EMA it is seeded, either
/// explicitly or by the first value it sees, so it produces output from the
/// first update onwards.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    seed: Option<f64>,
    current: Option<f64>,
}

impl Ema {
    /// Create a new EMA seeded by its first update.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self {
            period,
            multiplier,
            seed: None,
            current: None,
        }
    }

    /// Create an EMA starting from a known average.
    pub fn seeded(period: usize, initial: f64) -> Self {
        let mut ema = Self::new(period);
        ema.seed = Some(initial);
        ema.current = Some(initial);
        ema
    }

    /// Get the period.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Get the smoothing multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl StreamingIndicator for Ema {
    type Output = f64;

    fn update(&mut self, value: f64) -> Option<f64> {
        let next = match self.current {
            Some(ema) => (value - ema) * self.multiplier + ema,
            None => value,
        };
        self.current = Some(next);
        self.current
    }

    fn current(&self) -> Option<f64> {
        self.current
    }

    fn reset(&mut self) {
        self.current = self.seed;
    }

    fn name(&self) -> &str {
        "EMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_seeds_from_first_value() {
        let mut ema = Ema::new(3);
        assert!(!ema.is_ready());

        let first = ema.update(2.0).unwrap();
        assert!((first - 2.0).abs() < 1e-10);

        // mult = 2/(3+1) = 0.5
        let second = ema.update(4.0).unwrap();
        assert!((second - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_ema_explicit_seed() {
        let mut ema = Ema::seeded(8, 10.0);
        assert!(ema.is_ready());

        // mult = 2/9
        let next = ema.update(19.0).unwrap();
        assert!((next - 12.0).abs() < 1e-10);
    }

    #[test]
    fn test_ema_reset_returns_to_seed() {
        let mut ema = Ema::seeded(2, 5.0);
        ema.update(8.0);
        ema.reset();
        assert!((ema.current().unwrap() - 5.0).abs() < 1e-10);

        let mut unseeded = Ema::new(2);
        unseeded.update(8.0);
        unseeded.reset();
        assert!(unseeded.current().is_none());
    }

    #[test]
    #[should_panic(expected = "Period must be greater than 0")]
    fn test_ema_zero_period() {
        Ema::new(0);
    }
}
