//! Core traits for the trading system.

mod exchange;
mod handler;
mod indicator;
mod strategy;

pub use exchange::{MarketFeed, OrderGateway, TradeTape};
pub use handler::ObservationHandler;
pub use indicator::StreamingIndicator;
pub use strategy::{Strategy, StrategyConfig, StrategyState};
