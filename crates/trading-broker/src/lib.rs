//! Order lifecycle engine and exchange clients.
//!
//! - [`Trader`]: per-market account and order lifecycle, live or simulated
//! - [`Account`] / [`Reservation`]: two-phase commit of funds to an order
//! - [`SimulationLedger`]: tape replay for simulated fills
//! - [`PaperExchange`]: in-memory exchange
//! - [`HttpExchange`]: public REST market data and trade tape

pub mod account;
pub mod http;
mod paper;
pub mod simulation;
pub mod trader;

pub use account::{Account, Reservation, Settlement};
pub use http::{HttpEndpoints, HttpExchange, TimestampUnit, TradeFields};
pub use paper::PaperExchange;
pub use simulation::SimulationLedger;
pub use trader::{
    ExchangeOptions, KillSwitch, PendingOrder, Reconciliation, Trader, TraderConfig, TraderState,
    TraderSummary,
};
