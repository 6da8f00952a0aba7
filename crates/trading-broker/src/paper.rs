//! In-memory exchange for tests and dry runs.
//!
//! Quotes, the trade tape and balances are set directly. Orders rest until
//! the caller fills or cancels them, which is how tests play the part of
//! the market and of a human operator.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use trading_core::error::{BrokerError, DataError};
use trading_core::traits::{MarketFeed, OrderGateway, TradeTape};
use trading_core::types::{
    FeedQuote, LimitOrder, MarketSnapshot, OrderId, OrderReport, OrderStatus, Quote, TapeTrade,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct PaperOrder {
    market: String,
    report: OrderReport,
}

/// In-memory exchange implementing every collaborator trait.
#[derive(Debug)]
pub struct PaperExchange {
    quotes: Mutex<HashMap<String, FeedQuote>>,
    tape: Mutex<HashMap<String, Vec<TapeTrade>>>,
    orders: Mutex<HashMap<OrderId, PaperOrder>>,
    balances: Mutex<HashMap<String, Decimal>>,
    server_offset: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self {
            quotes: Mutex::default(),
            tape: Mutex::default(),
            orders: Mutex::default(),
            balances: Mutex::default(),
            server_offset: Duration::zero(),
        }
    }
}

impl PaperExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a server clock running `offset` ahead of the local one.
    pub fn with_server_offset(mut self, offset: Duration) -> Self {
        self.server_offset = offset;
        self
    }

    /// List `market` with the given quote.
    pub fn set_quote(&self, market: &str, quote: FeedQuote) {
        lock(&self.quotes).insert(market.to_string(), quote);
    }

    /// List `market` with a best bid and ask.
    pub fn set_book(&self, market: &str, bid: Decimal, ask: Decimal) {
        self.set_quote(market, FeedQuote::new(Quote::Book { bid, ask }));
    }

    /// Delist `market`.
    pub fn remove_quote(&self, market: &str) {
        lock(&self.quotes).remove(market);
    }

    /// Append a public trade to `market`'s tape.
    pub fn push_trade(&self, market: &str, trade: TapeTrade) {
        lock(&self.tape)
            .entry(market.to_string())
            .or_default()
            .push(trade);
    }

    pub fn set_balance(&self, currency: &str, amount: Decimal) {
        lock(&self.balances).insert(currency.to_string(), amount);
    }

    /// Look up an order without going through the gateway trait.
    pub fn order(&self, id: &OrderId) -> Option<OrderReport> {
        lock(&self.orders).get(id).map(|o| o.report.clone())
    }

    /// Orders still resting on the book.
    pub fn open_orders(&self) -> Vec<OrderReport> {
        lock(&self.orders)
            .values()
            .filter(|o| o.report.status.is_active())
            .map(|o| o.report.clone())
            .collect()
    }

    /// Orders placed on `market`, in any state.
    pub fn orders_for(&self, market: &str) -> Vec<OrderReport> {
        lock(&self.orders)
            .values()
            .filter(|o| o.market == market)
            .map(|o| o.report.clone())
            .collect()
    }

    /// Fill an order completely.
    pub fn fill_order(&self, id: &OrderId) -> Result<(), BrokerError> {
        self.update_active(id, |report| {
            report.filled_quantity = report.quantity;
            report.remaining_quantity = Decimal::ZERO;
            report.status = OrderStatus::Filled;
        })
    }

    /// Fill `quantity` more of an order.
    pub fn partially_fill(&self, id: &OrderId, quantity: Decimal) -> Result<(), BrokerError> {
        self.update_active(id, |report| {
            report.filled_quantity = (report.filled_quantity + quantity).min(report.quantity);
            report.remaining_quantity = report.quantity - report.filled_quantity;
            report.status = if report.remaining_quantity.is_zero() {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
        })
    }

    /// Cancel an order the way a human would from the exchange's website.
    pub fn cancel_out_of_band(&self, id: &OrderId) -> Result<(), BrokerError> {
        self.update_active(id, |report| report.status = OrderStatus::Cancelled)
    }

    fn update_active(
        &self,
        id: &OrderId,
        update: impl FnOnce(&mut OrderReport),
    ) -> Result<(), BrokerError> {
        let mut orders = lock(&self.orders);
        let order = orders
            .get_mut(id)
            .ok_or_else(|| BrokerError::OrderNotFound(id.to_string()))?;
        if order.report.status.is_terminal() {
            return Err(BrokerError::OrderRejected(format!(
                "Order {id} already {:?}",
                order.report.status
            )));
        }
        update(&mut order.report);
        Ok(())
    }
}

#[async_trait]
impl MarketFeed for PaperExchange {
    async fn fetch_snapshot(&self, market: &str) -> Result<MarketSnapshot, DataError> {
        Ok(lock(&self.quotes)
            .get(market)
            .cloned()
            .map_or(MarketSnapshot::Unavailable, MarketSnapshot::Available))
    }

    async fn fetch_market_summaries(&self) -> Result<Vec<(String, FeedQuote)>, DataError> {
        let mut summaries: Vec<(String, FeedQuote)> = lock(&self.quotes)
            .iter()
            .map(|(market, quote)| (market.clone(), quote.clone()))
            .collect();
        summaries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(summaries)
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, DataError> {
        Ok(Utc::now() + self.server_offset)
    }

    fn name(&self) -> &str {
        "Paper Exchange"
    }
}

#[async_trait]
impl TradeTape for PaperExchange {
    async fn get_recent_trades(
        &self,
        market: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TapeTrade>, BrokerError> {
        Ok(lock(&self.tape)
            .get(market)
            .map(|trades| {
                trades
                    .iter()
                    .filter(|t| t.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl OrderGateway for PaperExchange {
    async fn place_limit_order(&self, order: &LimitOrder) -> Result<OrderId, BrokerError> {
        if order.quantity <= Decimal::ZERO || order.price <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected(
                "Quantity and price must be positive".into(),
            ));
        }
        let id = OrderId::new(Uuid::new_v4().to_string());
        let report = OrderReport {
            id: id.clone(),
            side: order.side,
            status: OrderStatus::Open,
            price: order.price,
            quantity: order.quantity,
            filled_quantity: Decimal::ZERO,
            remaining_quantity: order.quantity,
        };
        lock(&self.orders).insert(
            id.clone(),
            PaperOrder {
                market: order.market.clone(),
                report,
            },
        );
        Ok(id)
    }

    async fn get_order_status(&self, id: &OrderId) -> Result<OrderReport, BrokerError> {
        self.order(id)
            .ok_or_else(|| BrokerError::OrderNotFound(id.to_string()))
    }

    async fn cancel_order(&self, id: &OrderId) -> Result<(), BrokerError> {
        self.update_active(id, |report| report.status = OrderStatus::Cancelled)
    }

    async fn get_account_balance(&self, currency: &str) -> Result<Decimal, BrokerError> {
        Ok(lock(&self.balances)
            .get(currency)
            .copied()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "Paper Exchange"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::Side;

    #[tokio::test]
    async fn test_unlisted_market_is_unavailable() {
        let exchange = PaperExchange::new();
        exchange.set_book("BTC_USD", dec!(100), dec!(101));

        let snapshot = exchange.fetch_snapshot("BTC_USD").await.unwrap();
        assert!(matches!(snapshot, MarketSnapshot::Available(_)));

        let snapshot = exchange.fetch_snapshot("DOGE_USD").await.unwrap();
        assert!(matches!(snapshot, MarketSnapshot::Unavailable));
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let exchange = PaperExchange::new();
        let order = LimitOrder::new("BTC_USD", Side::Buy, dec!(2), dec!(100));
        let id = exchange.place_limit_order(&order).await.unwrap();

        let report = exchange.get_order_status(&id).await.unwrap();
        assert_eq!(report.status, OrderStatus::Open);
        assert_eq!(exchange.open_orders().len(), 1);

        exchange.partially_fill(&id, dec!(0.5)).unwrap();
        let report = exchange.get_order_status(&id).await.unwrap();
        assert_eq!(report.status, OrderStatus::PartiallyFilled);
        assert_eq!(report.remaining_quantity, dec!(1.5));

        exchange.cancel_order(&id).await.unwrap();
        assert!(exchange.open_orders().is_empty());
        assert!(exchange.cancel_order(&id).await.is_err());
        assert_eq!(exchange.orders_for("BTC_USD").len(), 1);
    }

    #[tokio::test]
    async fn test_tape_filters_by_time() {
        let exchange = PaperExchange::new();
        let now = Utc::now();
        for secs in [-10, 0, 10] {
            exchange.push_trade(
                "BTC_USD",
                TapeTrade {
                    price: dec!(100),
                    quantity: dec!(1),
                    side: Side::Sell,
                    timestamp: now + Duration::seconds(secs),
                },
            );
        }

        let trades = exchange.get_recent_trades("BTC_USD", now).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert!(exchange
            .get_recent_trades("ETH_USD", now)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_balance_is_zero() {
        let exchange = PaperExchange::new();
        exchange.set_balance("USD", dec!(10));
        assert_eq!(exchange.get_account_balance("USD").await.unwrap(), dec!(10));
        assert_eq!(exchange.get_account_balance("BTC").await.unwrap(), Decimal::ZERO);
    }
}
