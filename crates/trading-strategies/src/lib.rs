//! Trading strategy implementations.
//!
//! This crate provides the strategies that turn observations into decisions:
//! - EMA crossover
//! - Parabolic SAR trend reversal
//! - Bid/ask spread scalping
//! - One-shot fast market buy

mod crossover;
mod fast_buy;
mod registry;
mod sar;
mod spread;

pub use crossover::{CrossoverConfig, CrossoverStrategy};
pub use fast_buy::{FastBuyConfig, FastBuyStrategy};
pub use registry::{StrategyInfo, StrategyRegistry};
pub use sar::{SarConfig, SarStrategy};
pub use spread::{SpreadConfig, SpreadStrategy};

use rust_decimal::Decimal;

/// True when a price is above the caller's outlier threshold.
pub(crate) fn exceeds_threshold(threshold: Option<Decimal>, price: Decimal) -> bool {
    threshold.is_some_and(|limit| price > limit)
}
