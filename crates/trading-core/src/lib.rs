//! Core types and traits for the trading system.
//!
//! This crate provides the foundational building blocks including:
//! - Market observations, trade tape entries and order reports
//! - Trading decisions and default positions
//! - The error taxonomy shared by every crate
//! - Collaborator traits for exchanges, strategies and pipeline callbacks

pub mod clock;
pub mod error;
pub mod precision;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BrokerError, DataError, IndicatorError, StrategyError, TradingError, TradingResult};
pub use traits::*;
pub use types::*;
