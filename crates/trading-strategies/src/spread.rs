//! Spread scalping strategy.
//!
//! While the bid/ask spread is wide enough to pay both fees and the minimum
//! return, alternates buy-at-bid and sell-at-ask decisions. Traders refuse
//! a leg they cannot fund, so the alternation waits for the previous leg to
//! fill. While the spread is too narrow, emits `Hold` so traders drift back
//! to their default position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trading_core::{
    error::StrategyError, traits::StrategyConfig, Decision, DefaultPosition, Observation, Strategy,
    StrategyState,
};
use trading_indicators::SpreadSize;

use crate::exceeds_threshold;

/// Configuration for the spread strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadConfig {
    /// Position to rest in while the spread is unprofitable
    pub default_position: DefaultPosition,
    /// Offset that prices our orders just ahead of the best bid/ask
    pub undercut: Decimal,
    /// Required capital multiplier per round trip
    pub minimum_return: Decimal,
    /// Exchange fee fraction per leg
    pub fee: Decimal,
    /// Asks above this are ignored
    pub outlier_threshold: Option<Decimal>,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            default_position: DefaultPosition::Hold,
            undercut: dec!(0.01),
            minimum_return: dec!(1.005),
            fee: dec!(0.005),
            outlier_threshold: None,
        }
    }
}

impl StrategyConfig for SpreadConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.undercut < Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Undercut must not be negative".into(),
            ));
        }
        SpreadSize::new(self.minimum_return, self.fee)
            .map(|_| ())
            .map_err(|e| StrategyError::InvalidConfig(e.to_string()))
    }
}

/// Spread scalping strategy.
pub struct SpreadStrategy {
    config: SpreadConfig,
    indicator: SpreadSize,
    current_position: DefaultPosition,
    /// Suppresses the repeated "not profitable" notice.
    first_time_unprofitable: bool,
    observations_processed: usize,
    outliers_skipped: usize,
    decisions_emitted: usize,
}

impl SpreadStrategy {
    /// Create a new spread strategy.
    ///
    /// The trader is assumed to already hold the default position.
    pub fn new(config: SpreadConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let indicator = SpreadSize::new(config.minimum_return, config.fee)
            .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            current_position: config.default_position,
            config,
            indicator,
            first_time_unprofitable: true,
            observations_processed: 0,
            outliers_skipped: 0,
            decisions_emitted: 0,
        })
    }

    /// Override the position the strategy believes the trader holds.
    pub fn set_current_position(&mut self, position: DefaultPosition) {
        self.current_position = position;
    }

    pub fn current_position(&self) -> DefaultPosition {
        self.current_position
    }

    /// Decide on one top-of-book reading.
    pub fn process(&mut self, highest_bid: Decimal, lowest_ask: Decimal) -> Option<Decision> {
        if exceeds_threshold(self.config.outlier_threshold, lowest_ask) {
            warn!(%lowest_ask, "Skipping outlier ask");
            self.outliers_skipped += 1;
            return None;
        }
        self.observations_processed += 1;

        // Profitability is judged on the prices our own orders would use
        let bid = highest_bid + self.config.undercut;
        let ask = lowest_ask - self.config.undercut;

        let decision = if self.indicator.is_profitable(bid, ask) {
            self.first_time_unprofitable = true;
            if self.current_position == DefaultPosition::Buy {
                self.current_position = DefaultPosition::Sell;
                Decision::sell(ask)
            } else {
                self.current_position = DefaultPosition::Buy;
                Decision::buy(bid)
            }
        } else {
            let default = self.config.default_position;
            if self.first_time_unprofitable {
                match default {
                    DefaultPosition::Buy => info!("Spread is not profitable. Holding major currency."),
                    DefaultPosition::Sell => info!("Spread is not profitable. Holding minor currency."),
                    DefaultPosition::Hold => info!("Spread is not profitable. Holding."),
                }
            }
            self.first_time_unprofitable = false;
            if default != DefaultPosition::Hold {
                self.current_position = default;
            }
            let price = match default {
                DefaultPosition::Buy => ask,
                DefaultPosition::Sell | DefaultPosition::Hold => bid,
            };
            Decision::hold(price, default)
        };

        debug!(%bid, %ask, action = %decision.action, "Spread evaluated");
        self.decisions_emitted += 1;
        Some(decision)
    }
}

impl Strategy for SpreadStrategy {
    fn name(&self) -> &str {
        "Spread Scalper"
    }

    fn description(&self) -> &str {
        "Alternates buying at the bid and selling at the ask while the spread beats fees"
    }

    fn on_observation(&mut self, observation: &Observation) -> Option<Decision> {
        match observation.quote.book() {
            Some((bid, ask)) => self.process(bid, ask),
            None => {
                debug!(market = %observation.market, "Spread strategy needs an order book quote");
                None
            }
        }
    }

    fn reset(&mut self) {
        self.current_position = self.config.default_position;
        self.first_time_unprofitable = true;
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
            custom: serde_json::json!({
                "current_position": self.current_position,
                "default_position": self.config.default_position,
            }),
            ..Default::default()
        }
    }
}
