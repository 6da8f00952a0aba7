//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{Decision, Observation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// State of a strategy for monitoring and serialization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrategyState {
    /// Strategy name
    pub name: String,
    /// Number of observations accepted
    pub observations_processed: usize,
    /// Number of observations skipped as outliers
    pub outliers_skipped: usize,
    /// Number of decisions emitted
    pub decisions_emitted: usize,
    /// Current indicator values
    pub indicators: HashMap<String, f64>,
    /// Custom strategy-specific state
    pub custom: serde_json::Value,
}

/// Core strategy trait.
///
/// A strategy turns pipeline observations into buy/sell/hold decisions.
/// It is driven from a single pipeline task and must not block.
pub trait Strategy: Send {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Process a new observation and optionally emit a decision.
    ///
    /// # Returns
    /// * `Some(Decision)` if the observers should act
    /// * `None` if no action is needed
    fn on_observation(&mut self, observation: &Observation) -> Option<Decision>;

    /// Reset the strategy state.
    fn reset(&mut self);

    /// Get the current strategy state for monitoring.
    fn state(&self) -> StrategyState;

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}
