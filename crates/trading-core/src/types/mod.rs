//! Core data types for the trading system.

mod decision;
mod market;
mod order;

pub use decision::{Action, Decision, DefaultPosition};
pub use market::{FeedQuote, MarketSnapshot, Observation, Quote, TapeTrade};
pub use order::{LimitOrder, OrderId, OrderReport, OrderStatus, Side};
