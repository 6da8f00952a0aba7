//! Exchange collaborator traits.
//!
//! An exchange client implements some subset of these capability groups.
//! Public market data and the trade tape need no credentials; placing
//! orders and reading balances do.

use crate::error::{BrokerError, DataError};
use crate::types::{FeedQuote, LimitOrder, MarketSnapshot, OrderId, OrderReport, TapeTrade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Polling access to prices and order books.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Fetch the current ticker or top of book for one market.
    ///
    /// A market the exchange does not list yields
    /// [`MarketSnapshot::Unavailable`], not an error.
    async fn fetch_snapshot(&self, market: &str) -> Result<MarketSnapshot, DataError>;

    /// Fetch every market the exchange lists in one call.
    async fn fetch_market_summaries(&self) -> Result<Vec<(String, FeedQuote)>, DataError> {
        Err(DataError::Unsupported("market summaries".into()))
    }

    /// Exchange server time, used to estimate clock skew.
    async fn server_time(&self) -> Result<DateTime<Utc>, DataError> {
        Err(DataError::Unsupported("server time".into()))
    }

    /// Get the feed name.
    fn name(&self) -> &str;
}

/// Authenticated order placement and account access.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Place a limit order.
    ///
    /// # Returns
    /// The exchange's handle for the new order
    async fn place_limit_order(&self, order: &LimitOrder) -> Result<OrderId, BrokerError>;

    /// Get the status of an order.
    async fn get_order_status(&self, id: &OrderId) -> Result<OrderReport, BrokerError>;

    /// Cancel an open order.
    async fn cancel_order(&self, id: &OrderId) -> Result<(), BrokerError>;

    /// Available balance of a single currency.
    async fn get_account_balance(&self, currency: &str) -> Result<Decimal, BrokerError>;

    /// Get the gateway name.
    fn name(&self) -> &str;
}

/// Public trade history, used to replay simulated fills.
#[async_trait]
pub trait TradeTape: Send + Sync {
    /// Trades on `market` executed at or after `since`.
    ///
    /// Implementations may return older entries too; callers filter.
    async fn get_recent_trades(
        &self,
        market: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TapeTrade>, BrokerError>;
}
