//! Order lifecycle engine.
//!
//! A [`Trader`] holds a balance/assets [`Account`] and at most one
//! outstanding order. Every `buy`, `sell` and `hold` first reconciles that
//! order, so account values are never read while a fill is unaccounted for.
//!
//! Without a gateway the trader simulates: orders never leave the process
//! and fills are inferred by replaying the public trade tape (see
//! [`SimulationLedger`]). After [`Trader::authenticate`] orders are placed
//! and polled on the exchange.

mod config;

pub use config::{ExchangeOptions, KillSwitch, TraderConfig};

use crate::account::{Account, Reservation, Settlement};
use crate::simulation::SimulationLedger;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trading_core::precision::{round_price, significant, truncate_quantity};
use trading_core::{
    BrokerError, Clock, DefaultPosition, LimitOrder, OrderGateway, OrderId, OrderStatus, Side,
    TradeTape, TradingError, TradingResult,
};
use uuid::Uuid;

/// Lifecycle state, derived from the pending order and the abort flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraderState {
    Idle,
    AwaitingBuyFill,
    AwaitingSellFill,
    Aborted,
}

/// Outcome of checking the outstanding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    NoOrder,
    Waiting,
    Filled,
    /// Cancelled by someone other than this trader
    Cancelled,
}

#[derive(Debug)]
enum Tracking {
    Simulated(SimulationLedger),
    Live,
}

/// The single order a trader may have outstanding.
///
/// Owns the [`Reservation`] for the funds it committed.
#[derive(Debug)]
pub struct PendingOrder {
    id: OrderId,
    side: Side,
    quantity: Decimal,
    price: Decimal,
    reservation: Reservation,
    tracking: Tracking,
}

impl PendingOrder {
    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Funds committed to this order.
    pub fn committed(&self) -> Decimal {
        self.reservation.amount()
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.tracking, Tracking::Simulated(_))
    }
}

/// Point-in-time view of a trader for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TraderSummary {
    pub market: String,
    pub balance: Decimal,
    pub assets: Decimal,
    pub committed: Decimal,
    pub state: TraderState,
    pub live: bool,
}

/// How much of the pending order a resolution accounts for.
enum Resolution {
    Waiting,
    Filled,
    Cancelled(Decimal),
}

/// Per-market order lifecycle and account engine.
pub struct Trader {
    config: TraderConfig,
    account: Account,
    post_fee: Decimal,
    can_buy: bool,
    can_sell: bool,
    pending: Option<PendingOrder>,
    gateway: Option<Arc<dyn OrderGateway>>,
    kill_switch: Option<OrderId>,
    tape: Arc<dyn TradeTape>,
    clock: Arc<dyn Clock>,
}

impl Trader {
    /// Create a simulating trader.
    ///
    /// # Arguments
    /// * `config` - Market, fees and starting funds
    /// * `tape` - Public trade history used to infer simulated fills
    /// * `clock` - Source of "now" for the tape windows
    pub fn new(
        config: TraderConfig,
        tape: Arc<dyn TradeTape>,
        clock: Arc<dyn Clock>,
    ) -> TradingResult<Self> {
        config.validate()?;
        let account = if config.start_by_buying {
            Account::new(config.starting_amount, Decimal::ZERO)
        } else {
            Account::new(Decimal::ZERO, config.starting_amount)
        };
        Ok(Self {
            post_fee: Decimal::ONE - config.exchange.fee,
            config,
            account,
            can_buy: true,
            can_sell: true,
            pending: None,
            gateway: None,
            kill_switch: None,
            tape,
            clock,
        })
    }

    /// Switch to live trading against `gateway`.
    ///
    /// Reads the account's real holdings, keeps `percentage_to_trade` of the
    /// side the trader starts on, and places the kill-switch order if one is
    /// configured.
    pub async fn authenticate(&mut self, gateway: Arc<dyn OrderGateway>) -> TradingResult<()> {
        if self.pending.is_some() {
            return Err(TradingError::Validation(
                "Cannot switch to live trading with a simulated order outstanding".into(),
            ));
        }

        let share = self.config.percentage_to_trade;
        self.account = if self.config.start_by_buying {
            let minor = gateway
                .get_account_balance(&self.config.minor_currency)
                .await?;
            Account::new(minor * share, Decimal::ZERO)
        } else {
            let major = gateway
                .get_account_balance(&self.config.major_currency)
                .await?;
            Account::new(Decimal::ZERO, major * share)
        };

        if let Some(kill_switch) = &self.config.kill_switch {
            let id = gateway.place_limit_order(&kill_switch.order()).await?;
            info!(market = %kill_switch.market, order_id = %id, "Kill switch order placed");
            self.kill_switch = Some(id);
        }

        info!(
            market = %self.config.market,
            exchange = gateway.name(),
            balance = %self.account.balance(),
            assets = %self.account.assets(),
            "Trading live"
        );
        self.gateway = Some(gateway);
        Ok(())
    }

    /// Set the position `hold` reverts toward, and how hard it tries.
    pub fn should_default_to(&mut self, position: DefaultPosition, aggressive: bool) {
        self.config.default_position = position;
        self.config.aggressive = aggressive;
    }

    /// Buy with the whole balance at `price`.
    pub async fn buy(&mut self, price: Decimal) -> TradingResult<()> {
        self.trade(Side::Buy, price).await
    }

    /// Sell all assets at `price`.
    pub async fn sell(&mut self, price: Decimal) -> TradingResult<()> {
        self.trade(Side::Sell, price).await
    }

    /// Drift toward the default position without a trading signal.
    ///
    /// Cancels an outstanding order that works against the default. Then,
    /// unless the default is `Hold`, orders toward it: always in aggressive
    /// mode, otherwise only with funds the cancellation just returned.
    pub async fn hold(&mut self, price: Decimal) -> TradingResult<()> {
        check_price(price)?;
        if !self.prepare().await? {
            return Ok(());
        }

        let target = match self.config.default_position {
            DefaultPosition::Buy => Some(Side::Buy),
            DefaultPosition::Sell => Some(Side::Sell),
            DefaultPosition::Hold => None,
        };
        let conflicting = self
            .pending
            .as_ref()
            .is_some_and(|order| Some(order.side) != target);
        let returned = if conflicting {
            self.cancel_pending().await?
        } else {
            None
        };

        let Some(target) = target else {
            return Ok(());
        };
        if self.pending.is_some() {
            debug!(market = %self.config.market, "Already ordering toward the default position");
            return Ok(());
        }

        // A cancelled order credits the side the default position spends
        let freed = returned.is_some_and(|s| s.proceeds > Decimal::ZERO);
        if self.config.aggressive || freed {
            self.open_order(target, price).await?;
        }
        Ok(())
    }

    /// Stop trading for good.
    ///
    /// Idempotent. The outstanding order, if any, is forgotten rather than
    /// cancelled; it is returned so the caller can deal with it.
    pub fn abort(&mut self) -> Option<PendingOrder> {
        let abandoned = self.pending.take();
        if let Some(order) = &abandoned {
            warn!(
                market = %self.config.market,
                order_id = %order.id,
                side = %order.side,
                quantity = %order.quantity,
                price = %order.price,
                "Abandoning outstanding order, reconcile it manually"
            );
        }
        if self.can_buy || self.can_sell {
            warn!(market = %self.config.market, "Trader aborted, shutting down");
        }
        self.can_buy = false;
        self.can_sell = false;
        abandoned
    }

    /// Check the outstanding order and report whether it just filled.
    pub async fn was_order_filled(&mut self) -> TradingResult<bool> {
        Ok(self.reconcile().await? == Reconciliation::Filled)
    }

    /// Bring the outstanding order's bookkeeping up to date.
    pub async fn reconcile(&mut self) -> TradingResult<Reconciliation> {
        let Some(order) = self.pending.as_mut() else {
            return Ok(Reconciliation::NoOrder);
        };

        let resolution = match &mut order.tracking {
            Tracking::Simulated(ledger) => {
                // Taken before the fetch so trades landing meanwhile fall
                // into the next window
                let now = self.clock.now();
                let trades = self
                    .tape
                    .get_recent_trades(&self.config.market, ledger.last_checked())
                    .await?;
                if ledger.replay(&trades, now) {
                    Resolution::Filled
                } else {
                    debug!(
                        order_id = %order.id,
                        filled = %ledger.filled(),
                        expected = %ledger.expected(),
                        "Simulated order waiting"
                    );
                    Resolution::Waiting
                }
            }
            Tracking::Live => {
                let gateway = self.gateway.as_ref().ok_or_else(|| {
                    TradingError::Internal("Live order without a gateway".into())
                })?;
                let report = gateway.get_order_status(&order.id).await?;
                match report.status {
                    OrderStatus::Filled => Resolution::Filled,
                    OrderStatus::Cancelled => Resolution::Cancelled(report.filled_quantity),
                    OrderStatus::PartiallyFilled => {
                        info!(
                            order_id = %order.id,
                            filled = %report.filled_quantity,
                            remaining = %report.remaining_quantity,
                            "Order partially filled"
                        );
                        Resolution::Waiting
                    }
                    OrderStatus::Open => Resolution::Waiting,
                }
            }
        };

        match resolution {
            Resolution::Waiting => Ok(Reconciliation::Waiting),
            Resolution::Filled => {
                if let Some(order) = self.pending.take() {
                    let quantity = order.quantity;
                    let settlement = self.close(order, quantity);
                    info!(
                        market = %self.config.market,
                        proceeds = %settlement.proceeds,
                        balance = %self.account.balance(),
                        assets = %self.account.assets(),
                        "Order filled"
                    );
                }
                Ok(Reconciliation::Filled)
            }
            Resolution::Cancelled(filled) => {
                if let Some(order) = self.pending.take() {
                    warn!(
                        market = %self.config.market,
                        order_id = %order.id,
                        "Order was cancelled outside the trader"
                    );
                    self.close(order, filled);
                }
                self.abort();
                Ok(Reconciliation::Cancelled)
            }
        }
    }

    /// Retarget the trader at another market.
    pub fn set_market(&mut self, market: impl Into<String>) -> TradingResult<()> {
        let market = market.into();
        if self.pending.is_some() && market != self.config.market {
            return Err(TradingError::Validation(format!(
                "Cannot move to {market} with an order outstanding on {}",
                self.config.market
            )));
        }
        self.config.market = market;
        Ok(())
    }

    /// Replace the spendable balance.
    pub fn override_balance(&mut self, balance: Decimal) {
        self.account.set_balance(balance);
    }

    /// Forget any held assets.
    pub fn clear_assets(&mut self) {
        self.account.set_assets(Decimal::ZERO);
    }

    pub fn state(&self) -> TraderState {
        if self.is_aborted() {
            return TraderState::Aborted;
        }
        match &self.pending {
            None => TraderState::Idle,
            Some(order) if order.side == Side::Buy => TraderState::AwaitingBuyFill,
            Some(_) => TraderState::AwaitingSellFill,
        }
    }

    pub fn summary(&self) -> TraderSummary {
        TraderSummary {
            market: self.config.market.clone(),
            balance: self.account.balance(),
            assets: self.account.assets(),
            committed: self
                .pending
                .as_ref()
                .map(PendingOrder::committed)
                .unwrap_or_default(),
            state: self.state(),
            live: self.is_live(),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.account.balance()
    }

    pub fn assets(&self) -> Decimal {
        self.account.assets()
    }

    pub fn market(&self) -> &str {
        &self.config.market
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    pub fn pending_order(&self) -> Option<&PendingOrder> {
        self.pending.as_ref()
    }

    pub fn can_buy(&self) -> bool {
        self.can_buy
    }

    pub fn can_sell(&self) -> bool {
        self.can_sell
    }

    pub fn is_aborted(&self) -> bool {
        !self.can_buy && !self.can_sell
    }

    pub fn is_live(&self) -> bool {
        self.gateway.is_some()
    }

    async fn trade(&mut self, side: Side, price: Decimal) -> TradingResult<()> {
        check_price(price)?;
        if !self.prepare().await? || !self.allowed(side) {
            return Ok(());
        }
        if let Some(order) = &self.pending {
            info!(
                market = %self.config.market,
                order_id = %order.id,
                requested = %side,
                "Order still outstanding, ignoring signal"
            );
            return Ok(());
        }
        self.open_order(side, price).await?;
        Ok(())
    }

    /// Kill-switch check and reconciliation. False once aborted.
    async fn prepare(&mut self) -> TradingResult<bool> {
        if self.is_aborted() {
            debug!(market = %self.config.market, "Trader aborted, ignoring signal");
            return Ok(false);
        }
        self.check_kill_switch().await?;
        if self.is_aborted() {
            return Ok(false);
        }
        self.reconcile().await?;
        Ok(!self.is_aborted())
    }

    fn allowed(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.can_buy,
            Side::Sell => self.can_sell,
        }
    }

    async fn check_kill_switch(&mut self) -> TradingResult<()> {
        let (Some(id), Some(gateway)) = (self.kill_switch.clone(), self.gateway.clone()) else {
            return Ok(());
        };
        let report = gateway.get_order_status(&id).await?;
        if !report.status.is_active() {
            warn!(market = %self.config.market, order_id = %id, "Emergency abort order was cancelled");
            self.abort();
        }
        Ok(())
    }

    /// Commit the whole spending side to a new order.
    ///
    /// Returns false, with the account untouched, when the quantity is
    /// below the exchange minimum.
    async fn open_order(&mut self, side: Side, price: Decimal) -> TradingResult<bool> {
        let options = &self.config.exchange;
        let price = round_price(price, options.price_decimals);
        check_price(price)?;

        let available = self.account.available(side);
        let quantity = match side {
            Side::Buy => available.checked_div(price).unwrap_or_default(),
            Side::Sell => available,
        };
        let quantity = truncate_quantity(significant(quantity), options.amount_decimals);
        if quantity.is_zero() || quantity < options.minimum_trade {
            info!(
                market = %self.config.market,
                %side,
                %quantity,
                minimum = %options.minimum_trade,
                "Not enough to trade, skipping"
            );
            return Ok(false);
        }

        let reservation = self.account.reserve(side);
        let (id, tracking) = match &self.gateway {
            None => {
                let expected = match side {
                    Side::Buy => quantity,
                    Side::Sell => significant(quantity * price),
                };
                let ledger = SimulationLedger::open(side, expected, price, self.clock.now());
                let id = OrderId::new(format!("sim-{}", Uuid::new_v4()));
                (id, Tracking::Simulated(ledger))
            }
            Some(gateway) => {
                let order = LimitOrder::new(&self.config.market, side, quantity, price);
                match gateway.place_limit_order(&order).await {
                    Ok(id) => (id, Tracking::Live),
                    Err(e) => {
                        self.account.release(reservation);
                        return Err(e.into());
                    }
                }
            }
        };

        info!(
            market = %self.config.market,
            order_id = %id,
            %side,
            %quantity,
            %price,
            simulated = matches!(tracking, Tracking::Simulated(_)),
            "Order opened"
        );
        self.pending = Some(PendingOrder {
            id,
            side,
            quantity,
            price,
            reservation,
            tracking,
        });
        Ok(true)
    }

    /// Cancel the outstanding order and settle what it filled.
    async fn cancel_pending(&mut self) -> TradingResult<Option<Settlement>> {
        let Some(order) = self.pending.take() else {
            return Ok(None);
        };

        let simulated_fill = match &order.tracking {
            Tracking::Simulated(ledger) => Some(order.quantity * ledger.fill_ratio()),
            Tracking::Live => None,
        };
        let filled = match simulated_fill {
            Some(filled) => filled,
            None => match self.cancel_live(&order).await {
                Ok(filled) => filled,
                Err(e) => {
                    self.pending = Some(order);
                    return Err(e);
                }
            },
        };

        let id = order.id.clone();
        let settlement = self.close(order, filled);
        info!(
            market = %self.config.market,
            order_id = %id,
            refund = %settlement.refund,
            proceeds = %settlement.proceeds,
            "Order cancelled"
        );
        Ok(Some(settlement))
    }

    /// Cancel on the exchange and read back the final filled quantity.
    async fn cancel_live(&self, order: &PendingOrder) -> TradingResult<Decimal> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| TradingError::Internal("Live order without a gateway".into()))?;

        // An order that filled meanwhile refuses cancellation; the report
        // below decides
        let cancelled = gateway.cancel_order(&order.id).await;
        let report = gateway.get_order_status(&order.id).await?;
        if report.status.is_active() {
            return Err(match cancelled {
                Err(e) => e.into(),
                Ok(()) => BrokerError::OrderRejected(format!(
                    "Order {} still open after cancellation",
                    order.id
                ))
                .into(),
            });
        }
        Ok(match report.status {
            OrderStatus::Filled => order.quantity,
            _ => report.filled_quantity,
        })
    }

    /// Settle `order` given how much of it filled.
    fn close(&mut self, order: PendingOrder, filled: Decimal) -> Settlement {
        let filled = filled.clamp(Decimal::ZERO, order.quantity);
        let reserved = order.reservation.amount();
        let settlement = match order.side {
            Side::Buy => Settlement {
                refund: reserved - filled * order.price,
                proceeds: filled * self.post_fee,
            },
            Side::Sell => Settlement {
                refund: reserved - filled,
                proceeds: filled * order.price * self.post_fee,
            },
        };
        self.account.settle(order.reservation, settlement);
        settlement
    }
}

fn check_price(price: Decimal) -> TradingResult<()> {
    if price <= Decimal::ZERO {
        return Err(TradingError::Validation(format!(
            "Price must be positive, got {price}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PaperExchange;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use trading_core::{ManualClock, TapeTrade};

    const MARKET: &str = "BTC_USD";

    struct Harness {
        exchange: Arc<PaperExchange>,
        clock: Arc<ManualClock>,
        start: DateTime<Utc>,
    }

    impl Harness {
        fn new() -> Self {
            let start = Utc::now();
            Self {
                exchange: Arc::new(PaperExchange::new()),
                clock: Arc::new(ManualClock::new(start)),
                start,
            }
        }

        fn trader(&self, config: TraderConfig) -> Trader {
            Trader::new(config, self.exchange.clone(), self.clock.clone()).unwrap()
        }

        fn tape(&self, side: Side, quantity: Decimal, after_secs: i64) {
            self.exchange.push_trade(
                MARKET,
                TapeTrade {
                    price: dec!(10),
                    quantity,
                    side,
                    timestamp: self.start + Duration::seconds(after_secs),
                },
            );
        }

        fn advance_to(&self, secs: i64) {
            self.clock.set(self.start + Duration::seconds(secs));
        }
    }

    fn config() -> TraderConfig {
        TraderConfig::new(MARKET, "BTC", "USD")
    }

    #[tokio::test]
    async fn test_simulated_buy_fills_from_tape() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());

        trader.buy(dec!(10)).await.unwrap();
        assert_eq!(trader.balance(), Decimal::ZERO);
        assert_eq!(trader.state(), TraderState::AwaitingBuyFill);
        assert_eq!(trader.pending_order().unwrap().quantity(), dec!(10));

        harness.tape(Side::Sell, dec!(4), 1);
        harness.tape(Side::Sell, dec!(7), 2);
        harness.advance_to(10);

        assert!(trader.was_order_filled().await.unwrap());
        assert_eq!(trader.assets(), dec!(9.975));
        assert_eq!(trader.balance(), Decimal::ZERO);
        assert_eq!(trader.state(), TraderState::Idle);
    }

    #[tokio::test]
    async fn test_partial_tape_keeps_waiting() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());

        trader.buy(dec!(10)).await.unwrap();
        harness.tape(Side::Sell, dec!(4), 1);
        harness.tape(Side::Buy, dec!(40), 2);
        harness.advance_to(5);

        assert_eq!(trader.reconcile().await.unwrap(), Reconciliation::Waiting);
        assert_eq!(trader.state(), TraderState::AwaitingBuyFill);
        assert_eq!(trader.assets(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_round_trip_loses_exactly_the_fees() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());

        trader.buy(dec!(10)).await.unwrap();
        harness.tape(Side::Sell, dec!(11), 1);
        harness.advance_to(5);

        trader.sell(dec!(10)).await.unwrap();
        assert_eq!(trader.assets(), Decimal::ZERO);
        assert_eq!(trader.state(), TraderState::AwaitingSellFill);

        harness.tape(Side::Buy, dec!(10), 6);
        harness.advance_to(10);
        assert!(trader.was_order_filled().await.unwrap());

        let fee_loss = Decimal::ONE - (Decimal::ONE - dec!(0.0025)) * (Decimal::ONE - dec!(0.0025));
        assert_eq!(trader.balance(), dec!(100) * (Decimal::ONE - fee_loss));
        assert_eq!(trader.balance(), dec!(99.500625));
    }

    #[tokio::test]
    async fn test_below_minimum_trade_is_skipped() {
        let harness = Harness::new();
        let mut trader = harness.trader(TraderConfig {
            starting_amount: dec!(0.05),
            ..config()
        });

        trader.buy(dec!(10)).await.unwrap();
        assert_eq!(trader.state(), TraderState::Idle);
        assert_eq!(trader.balance(), dec!(0.05));

        trader.sell(dec!(10)).await.unwrap();
        assert_eq!(trader.state(), TraderState::Idle);
    }

    #[tokio::test]
    async fn test_duplicate_buy_signals_open_one_order() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());

        trader.buy(dec!(10)).await.unwrap();
        let first = trader.pending_order().unwrap().id().clone();
        trader.buy(dec!(10)).await.unwrap();
        trader.buy(dec!(9)).await.unwrap();

        assert_eq!(trader.pending_order().unwrap().id(), &first);
        assert_eq!(trader.pending_order().unwrap().committed(), dec!(100));
        assert_eq!(trader.balance(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_abort_freezes_the_trader() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());

        trader.buy(dec!(10)).await.unwrap();
        let abandoned = trader.abort();
        assert!(abandoned.is_some());
        assert!(trader.abort().is_none());
        assert_eq!(trader.state(), TraderState::Aborted);

        harness.tape(Side::Sell, dec!(100), 1);
        harness.advance_to(5);
        trader.buy(dec!(10)).await.unwrap();
        trader.sell(dec!(10)).await.unwrap();
        trader.hold(dec!(10)).await.unwrap();

        assert_eq!(trader.balance(), Decimal::ZERO);
        assert_eq!(trader.assets(), Decimal::ZERO);
        assert!(!trader.can_buy() && !trader.can_sell());
    }

    #[tokio::test]
    async fn test_non_positive_price_is_rejected() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());
        assert!(matches!(
            trader.buy(Decimal::ZERO).await,
            Err(TradingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_hold_cancels_and_reverts_with_returned_funds() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());
        trader.should_default_to(DefaultPosition::Sell, false);

        trader.buy(dec!(10)).await.unwrap();
        harness.tape(Side::Sell, dec!(4), 1);
        harness.advance_to(5);

        trader.hold(dec!(10)).await.unwrap();

        // 40% filled: 60 refunded, 4 assets net of fee now being sold
        assert_eq!(trader.balance(), dec!(60));
        assert_eq!(trader.state(), TraderState::AwaitingSellFill);
        let order = trader.pending_order().unwrap();
        assert_eq!(order.quantity(), dec!(3.99));
    }

    #[tokio::test]
    async fn test_hold_default_hold_only_cancels() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());

        trader.buy(dec!(10)).await.unwrap();
        trader.hold(dec!(10)).await.unwrap();

        assert_eq!(trader.state(), TraderState::Idle);
        assert_eq!(trader.balance(), dec!(100));
    }

    #[tokio::test]
    async fn test_hold_non_aggressive_does_not_spend_idle_funds() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());
        trader.should_default_to(DefaultPosition::Buy, false);

        trader.hold(dec!(10)).await.unwrap();
        assert_eq!(trader.state(), TraderState::Idle);

        trader.should_default_to(DefaultPosition::Buy, true);
        trader.hold(dec!(10)).await.unwrap();
        assert_eq!(trader.state(), TraderState::AwaitingBuyFill);
    }

    #[tokio::test]
    async fn test_live_order_fills() {
        let harness = Harness::new();
        harness.exchange.set_balance("USD", dec!(1000));
        let mut trader = harness.trader(TraderConfig {
            percentage_to_trade: dec!(0.5),
            ..config()
        });

        trader.authenticate(harness.exchange.clone()).await.unwrap();
        assert!(trader.is_live());
        assert_eq!(trader.balance(), dec!(500));

        trader.buy(dec!(10)).await.unwrap();
        let id = trader.pending_order().unwrap().id().clone();
        assert!(!trader.pending_order().unwrap().is_simulated());

        assert!(!trader.was_order_filled().await.unwrap());
        harness.exchange.fill_order(&id).unwrap();
        assert!(trader.was_order_filled().await.unwrap());
        assert_eq!(trader.assets(), dec!(49.875));
    }

    #[tokio::test]
    async fn test_human_cancel_aborts_after_settling() {
        let harness = Harness::new();
        harness.exchange.set_balance("USD", dec!(100));
        let mut trader = harness.trader(config());
        trader.authenticate(harness.exchange.clone()).await.unwrap();

        trader.buy(dec!(10)).await.unwrap();
        let id = trader.pending_order().unwrap().id().clone();
        harness.exchange.partially_fill(&id, dec!(2)).unwrap();
        harness.exchange.cancel_out_of_band(&id).unwrap();

        trader.sell(dec!(10)).await.unwrap();

        assert_eq!(trader.state(), TraderState::Aborted);
        assert_eq!(trader.balance(), dec!(80));
        assert_eq!(trader.assets(), dec!(1.995));
        assert_eq!(harness.exchange.open_orders().len(), 0);
    }

    #[tokio::test]
    async fn test_live_hold_cancels_on_exchange() {
        let harness = Harness::new();
        harness.exchange.set_balance("USD", dec!(100));
        let mut trader = harness.trader(config());
        trader.authenticate(harness.exchange.clone()).await.unwrap();

        trader.buy(dec!(10)).await.unwrap();
        let id = trader.pending_order().unwrap().id().clone();
        harness.exchange.partially_fill(&id, dec!(5)).unwrap();

        trader.hold(dec!(10)).await.unwrap();

        assert_eq!(trader.state(), TraderState::Idle);
        assert_eq!(trader.balance(), dec!(50));
        assert_eq!(trader.assets(), dec!(4.9875));
        assert!(harness.exchange.open_orders().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_kill_switch_aborts() {
        let harness = Harness::new();
        harness.exchange.set_balance("USD", dec!(100));
        let mut trader = harness.trader(TraderConfig {
            kill_switch: Some(KillSwitch {
                market: MARKET.into(),
                side: Side::Sell,
                quantity: dec!(0.01),
                price: dec!(1000000),
            }),
            ..config()
        });
        trader.authenticate(harness.exchange.clone()).await.unwrap();

        let sentinel = harness.exchange.open_orders().pop().unwrap();
        trader.buy(dec!(10)).await.unwrap();
        assert_eq!(trader.state(), TraderState::AwaitingBuyFill);

        harness.exchange.cancel_out_of_band(&sentinel.id).unwrap();
        trader.hold(dec!(10)).await.unwrap();

        assert_eq!(trader.state(), TraderState::Aborted);
    }

    #[tokio::test]
    async fn test_market_cannot_move_with_order_outstanding() {
        let harness = Harness::new();
        let mut trader = harness.trader(config());
        trader.buy(dec!(10)).await.unwrap();

        assert!(trader.set_market("ETH_USD").is_err());
        assert!(trader.set_market(MARKET).is_ok());
    }

    proptest! {
        #[test]
        fn prop_below_minimum_never_commits(balance in 1u64..100_000_000, price in 1u32..1_000) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let harness = Harness::new();
            let balance = Decimal::from(balance) / dec!(100_000);
            let price = Decimal::from(price);
            let mut trader = harness.trader(TraderConfig {
                starting_amount: balance,
                ..config()
            });

            runtime.block_on(trader.buy(price)).unwrap();
            let expected = if balance / price < dec!(0.01) {
                TraderState::Idle
            } else {
                TraderState::AwaitingBuyFill
            };
            prop_assert_eq!(trader.state(), expected);
            if expected == TraderState::Idle {
                prop_assert_eq!(trader.balance(), balance);
            }
        }

        #[test]
        fn prop_aborted_trader_ignores_every_signal(
            buy_first in any::<bool>(),
            signals in prop::collection::vec((0u8..3, 1u32..1_000), 0..16),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let harness = Harness::new();
            let mut trader = harness.trader(config());
            if buy_first {
                runtime.block_on(trader.buy(dec!(10))).unwrap();
            }
            trader.abort();
            let frozen = (trader.balance(), trader.assets(), trader.state());

            // Enough tape to fill anything a live trader would have ordered
            harness.tape(Side::Sell, dec!(1_000_000), 1);
            harness.tape(Side::Buy, dec!(1_000_000), 2);
            harness.advance_to(10);

            for (signal, price) in signals {
                let price = Decimal::from(price);
                let result = match signal {
                    0 => runtime.block_on(trader.buy(price)),
                    1 => runtime.block_on(trader.sell(price)),
                    _ => runtime.block_on(trader.hold(price)),
                };
                prop_assert!(result.is_ok());
                prop_assert_eq!((trader.balance(), trader.assets(), trader.state()), frozen);
                prop_assert!(trader.pending_order().is_none());
            }
            prop_assert!(trader.abort().is_none());
            prop_assert_eq!(trader.state(), TraderState::Aborted);
        }
    }
}
