//! Moving Average Crossover Strategy.
//!
//! Generates buy decisions when the short EMA crosses above the long EMA,
//! and sell decisions when the long EMA crosses above the short EMA.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trading_core::{
    error::StrategyError,
    traits::{StrategyConfig, StreamingIndicator},
    Decision, Observation, Strategy, StrategyState,
};
use trading_indicators::Ema;

use crate::exceeds_threshold;

/// Configuration for the crossover strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    /// Short EMA length, in expected observations
    pub short_period: usize,
    /// Long EMA length, in expected observations
    pub long_period: usize,
    /// Starting value of the short EMA (seeded from the first price if unset)
    pub initial_short: Option<f64>,
    /// Starting value of the long EMA
    pub initial_long: Option<f64>,
    /// Prices above this are ignored
    pub outlier_threshold: Option<Decimal>,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            short_period: 12,
            long_period: 26,
            initial_short: None,
            initial_long: None,
            outlier_threshold: None,
        }
    }
}

impl StrategyConfig for CrossoverConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.short_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "Short period must be greater than 0".into(),
            ));
        }
        if self.short_period >= self.long_period {
            return Err(StrategyError::InvalidConfig(
                "Short period must be less than long period".into(),
            ));
        }
        if self.initial_short.is_some() != self.initial_long.is_some() {
            return Err(StrategyError::InvalidConfig(
                "Initial averages must be given together".into(),
            ));
        }
        Ok(())
    }
}

/// EMA crossover strategy.
pub struct CrossoverStrategy {
    config: CrossoverConfig,
    short: Ema,
    long: Ema,
    prev_short: Option<f64>,
    prev_long: Option<f64>,
    observations_processed: usize,
    outliers_skipped: usize,
    decisions_emitted: usize,
}

impl CrossoverStrategy {
    /// Create a new crossover strategy from a validated config.
    pub fn new(config: CrossoverConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let (short, long) = Self::averages(&config);
        Ok(Self {
            config,
            short,
            long,
            prev_short: None,
            prev_long: None,
            observations_processed: 0,
            outliers_skipped: 0,
            decisions_emitted: 0,
        })
    }

    fn averages(config: &CrossoverConfig) -> (Ema, Ema) {
        match (config.initial_short, config.initial_long) {
            (Some(short), Some(long)) => (
                Ema::seeded(config.short_period, short),
                Ema::seeded(config.long_period, long),
            ),
            _ => (Ema::new(config.short_period), Ema::new(config.long_period)),
        }
    }

    /// Feed one price and return a decision on a crossing.
    pub fn adjust(&mut self, price: Decimal) -> Option<Decision> {
        if exceeds_threshold(self.config.outlier_threshold, price) {
            warn!(%price, "Skipping outlier price");
            self.outliers_skipped += 1;
            return None;
        }
        let value = price.to_f64()?;

        let short = self.short.update(value)?;
        let long = self.long.update(value)?;
        self.observations_processed += 1;

        let decision = match (self.prev_short, self.prev_long) {
            // First observation only establishes the ordering
            _ if self.observations_processed == 1 => None,
            (Some(prev_s), Some(prev_l)) if prev_s <= prev_l && short > long => {
                debug!(short, long, "Short average crossed above long average");
                Some(Decision::buy(price))
            }
            (Some(prev_s), Some(prev_l)) if prev_l <= prev_s && long > short => {
                debug!(short, long, "Long average crossed above short average");
                Some(Decision::sell(price))
            }
            _ => None,
        };

        self.prev_short = Some(short);
        self.prev_long = Some(long);
        if decision.is_some() {
            self.decisions_emitted += 1;
        }
        decision
    }
}

impl Strategy for CrossoverStrategy {
    fn name(&self) -> &str {
        "EMA Crossover"
    }

    fn description(&self) -> &str {
        "Buys when the short EMA crosses above the long EMA and sells on the opposite cross"
    }

    fn on_observation(&mut self, observation: &Observation) -> Option<Decision> {
        self.adjust(observation.quote.reference_price())
    }

    fn reset(&mut self) {
        let (short, long) = Self::averages(&self.config);
        self.short = short;
        self.long = long;
        self.prev_short = None;
        self.prev_long = None;
        self.observations_processed = 0;
        self.outliers_skipped = 0;
        self.decisions_emitted = 0;
    }

    fn state(&self) -> StrategyState {
        StrategyState {
            name: self.name().to_string(),
            observations_processed: self.observations_processed,
            outliers_skipped: self.outliers_skipped,
            decisions_emitted: self.decisions_emitted,
            indicators: [
                ("short_ema".to_string(), self.prev_short.unwrap_or(0.0)),
                ("long_ema".to_string(), self.prev_long.unwrap_or(0.0)),
            ]
            .into_iter()
            .collect(),
            custom: serde_json::json!({
                "short_period": self.config.short_period,
                "long_period": self.config.long_period,
            }),
        }
    }
}
