//! Strategy registry for dynamic strategy loading.

use crate::{
    CrossoverConfig, CrossoverStrategy, FastBuyConfig, FastBuyStrategy, SarConfig, SarStrategy,
    SpreadConfig, SpreadStrategy,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trading_core::{error::StrategyError, traits::Strategy};

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub key: String,
    /// Strategy name
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Default configuration as JSON
    pub default_config: serde_json::Value,
}

/// Registry for available trading strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
        };

        registry.register(
            "crossover",
            "EMA Crossover",
            "Buys when the short EMA crosses above the long EMA and sells on the opposite cross",
            serde_json::to_value(CrossoverConfig::default()).unwrap_or_default(),
        );
        registry.register(
            "fast_buy",
            "Fast Market Buy",
            "Buys one market once at a capped price, then sells at a profit target",
            serde_json::to_value(FastBuyConfig::default()).unwrap_or_default(),
        );
        registry.register(
            "sar",
            "Parabolic SAR",
            "Buys and sells when the parabolic stop-and-reverse flips trend",
            serde_json::to_value(SarConfig::default()).unwrap_or_default(),
        );
        registry.register(
            "spread",
            "Spread Scalper",
            "Alternates buying at the bid and selling at the ask while the spread beats fees",
            serde_json::to_value(SpreadConfig::default()).unwrap_or_default(),
        );

        registry
    }

    fn register(&mut self, key: &str, name: &str, description: &str, default_config: serde_json::Value) {
        self.strategies.insert(
            key.to_string(),
            StrategyInfo {
                key: key.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                default_config,
            },
        );
    }

    /// List all available strategies.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    /// Get strategy info by name.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.strategies.get(name)
    }

    /// Check if a strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Create a strategy instance from configuration.
    ///
    /// Missing fields fall back to the strategy's defaults; `null` means
    /// "all defaults".
    pub fn create(
        &self,
        name: &str,
        config: serde_json::Value,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        match name {
            "crossover" => {
                let config: CrossoverConfig = parse(config)?;
                Ok(Box::new(CrossoverStrategy::new(config)?))
            }
            "fast_buy" => {
                let config: FastBuyConfig = parse(config)?;
                Ok(Box::new(FastBuyStrategy::new(config)?))
            }
            "sar" => {
                let config: SarConfig = parse(config)?;
                Ok(Box::new(SarStrategy::new(config)?))
            }
            "spread" => {
                let config: SpreadConfig = parse(config)?;
                Ok(Box::new(SpreadStrategy::new(config)?))
            }
            _ => Err(StrategyError::NotFound(name.to_string())),
        }
    }

    /// Create a strategy with default configuration.
    pub fn create_default(&self, name: &str) -> Result<Box<dyn Strategy>, StrategyError> {
        let info = self
            .get(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))?;
        self.create(name, info.default_config.clone())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse<T: DeserializeOwned + Default>(config: serde_json::Value) -> Result<T, StrategyError> {
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config).map_err(|e| StrategyError::InvalidConfig(e.to_string()))
}
