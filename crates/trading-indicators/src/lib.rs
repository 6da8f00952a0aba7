//! Streaming technical indicators.
//!
//! This crate provides the stateful accumulators strategies are built on:
//! - Exponential moving average (seeded, streaming)
//! - Parabolic stop-and-reverse trend tracker
//! - Bid/ask spread profitability test
//!
//! Indicators do no I/O and are owned by exactly one strategy.

pub mod moving_average;
pub mod spread;
pub mod stop_and_reverse;

pub use moving_average::Ema;
pub use spread::SpreadSize;
pub use stop_and_reverse::{ParabolicSar, Trend};
