//! Parabolic SAR trend-reversal strategy.
//!
//! Observations are grouped into periods. Each completed period's high and
//! low are fed to a stop-and-reverse tracker; a bullish flip buys at the
//! period close and a bearish flip sells.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trading_core::{
    error::StrategyError, traits::StrategyConfig, Decision, Observation, Strategy, StrategyState,
};
use trading_indicators::{ParabolicSar, Trend};

use crate::exceeds_threshold;

/// Configuration for the SAR strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SarConfig {
    /// Observations grouped into one SAR period
    pub observations_per_period: usize,
    /// Acceleration factor step
    pub acceleration_factor: f64,
    /// Acceleration factor cap
    pub max_acceleration_factor: f64,
    /// Prices above this are ignored
    pub outlier_threshold: Option<Decimal>,
}

impl Default for SarConfig {
    fn default() -> Self {
        Self {
            observations_per_period: 4,
            acceleration_factor: 0.02,
            max_acceleration_factor: 0.2,
            outlier_threshold: None,
        }
    }
}

impl StrategyConfig for SarConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.observations_per_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "Observations per period must be greater than 0".into(),
            ));
        }
        if self.acceleration_factor <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Acceleration factor must be positive".into(),
            ));
        }
        if self.acceleration_factor > self.max_acceleration_factor {
            return Err(StrategyError::InvalidConfig(
                "Acceleration factor must not exceed its maximum".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Period {
    high: f64,
    low: f64,
    count: usize,
}

impl Period {
    const EMPTY: Period = Period {
        high: f64::NEG_INFINITY,
        low: f64::INFINITY,
        count: 0,
    };

    fn push(&mut self, value: f64) {
        self.high = self.high.max(value);
        self.low = self.low.min(value);
        self.count += 1;
    }
}

/// SAR reversal strategy.
pub struct SarStrategy {
    config: SarConfig,
    sar: ParabolicSar,
    period: Period,
    observations_processed: usize,
    outliers_skipped: usize,
    decisions_emitted: usize,
}

impl SarStrategy {
    /// Create a new SAR strategy from a validated config.
    pub fn new(config: SarConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let sar = ParabolicSar::new(config.acceleration_factor, config.max_acceleration_factor);
        Ok(Self {
            config,
            sar,
            period: Period::EMPTY,
            observations_processed: 0,
            outliers_skipped: 0,
            decisions_emitted: 0,
        })
    }

    /// Feed one price; a completed period may produce a decision.
    pub fn adjust(&mut self, price: Decimal) -> Option<Decision> {
        if exceeds_threshold(self.config.outlier_threshold, price) {
            warn!(%price, "Skipping outlier price");
            self.outliers_skipped += 1;
            return None;
        }
        let value = price.to_f64()?;

        self.observations_processed += 1;
        self.period.push(value);
        if self.period.count < self.config.observations_per_period {
            return None;
        }

        let Period { high, low, .. } = std::mem::replace(&mut self.period, Period::EMPTY);
        let decision = match self.sar.update(high, low)? {
            Trend::Bullish => Decision::buy(price),
            Trend::Bearish => Decision::sell(price),
        };
        debug!(high, low, action = %decision.action, "SAR reversed");
        self.decisions_emitted += 1;
        Some(decision)
    }
}

impl Strategy for SarStrategy {
    fn name(&self) -> &str {
        "Parabolic SAR"
    }

    fn description(&self) -> &str {
        "Buys and sells when the parabolic stop-and-reverse flips trend"
    }

    fn on_observation(&mut self, observation: &Observation) -> Option<Decision> {
        self.adjust(observation.quote.reference_price())
    }

    fn reset(&mut self) {
        self.sar.reset();
        self.period = Period::EMPTY;
        self.observations_processed = 0;
        self.outliers_skipped = 0;
        self.decisions_emitted = 0;
    }

    fn state(&self) -> StrategyState {
        let mut indicators = std::collections::HashMap::new();
        if let Some(value) = self.sar.value() {
            indicators.insert("sar".to_string(), value);
        }
        StrategyState {
            name: self.name().to_string(),
            observations_processed: self.observations_processed,
            outliers_skipped: self.outliers_skipped,
            decisions_emitted: self.decisions_emitted,
            indicators,
            custom: serde_json::json!({
                "trend": self.sar.trend(),
                "observations_per_period": self.config.observations_per_period,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::Action;

    fn strategy(per_period: usize) -> SarStrategy {
        SarStrategy::new(SarConfig {
            observations_per_period: per_period,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(SarConfig::default().validate().is_ok());
        let config = SarConfig {
            observations_per_period: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = SarConfig {
            acceleration_factor: 0.5,
            max_acceleration_factor: 0.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(matches!(
            SarStrategy::new(config),
            Err(StrategyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_only_complete_periods_reach_the_indicator() {
        let mut strategy = strategy(3);
        for price in [dec!(10), dec!(11)] {
            assert!(strategy.adjust(price).is_none());
        }
        assert!(!strategy.sar.is_set_up());
        assert_eq!(strategy.period.count, 2);

        strategy.adjust(dec!(12));
        assert_eq!(strategy.period.count, 0);
    }

    #[test]
    fn test_crash_sells_then_rally_buys() {
        let mut strategy = strategy(2);
        let mut decisions = Vec::new();

        // Steady climb: two observations per period
        for i in 0..12 {
            let price = Decimal::from(10 + i);
            decisions.extend(strategy.adjust(price));
        }
        assert!(decisions.is_empty());

        decisions.extend(strategy.adjust(dec!(5)));
        decisions.extend(strategy.adjust(dec!(4)));
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].action, Action::Sell);
        assert_eq!(decisions[0].price, dec!(4));

        decisions.extend(strategy.adjust(dec!(40)));
        decisions.extend(strategy.adjust(dec!(41)));
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[1].action, Action::Buy);
    }

    #[test]
    fn test_outlier_does_not_touch_period() {
        let mut strategy = SarStrategy::new(SarConfig {
            observations_per_period: 2,
            outlier_threshold: Some(dec!(100)),
            ..Default::default()
        })
        .unwrap();
        strategy.adjust(dec!(10));
        strategy.adjust(dec!(1000));
        assert_eq!(strategy.period.count, 1);
        assert_eq!(strategy.state().outliers_skipped, 1);
    }
}
