//! Simulated fill reconciliation by trade tape replay.
//!
//! A simulated order is considered filled once the opposite side of the
//! public tape has traded at least as much as the order needed. Each check
//! counts the half-open window `[last_checked, now)` and then moves
//! `last_checked` to `now`, so consecutive checks partition time and no
//! tape entry is counted twice.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use trading_core::{Side, TapeTrade};

/// Fill progress of one simulated order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationLedger {
    side: Side,
    /// Assets for a buy, balance for a sell.
    expected: Decimal,
    filled: Decimal,
    limit_price: Decimal,
    last_checked: DateTime<Utc>,
}

impl SimulationLedger {
    /// Start tracking a new simulated order placed at `opened_at`.
    pub fn open(
        side: Side,
        expected: Decimal,
        limit_price: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            side,
            expected,
            filled: Decimal::ZERO,
            limit_price,
            last_checked: opened_at,
        }
    }

    pub fn expected(&self) -> Decimal {
        self.expected
    }

    pub fn filled(&self) -> Decimal {
        self.filled
    }

    pub fn last_checked(&self) -> DateTime<Utc> {
        self.last_checked
    }

    pub fn is_filled(&self) -> bool {
        self.filled >= self.expected
    }

    /// Filled share of the order, capped at one.
    pub fn fill_ratio(&self) -> Decimal {
        if self.expected.is_zero() {
            return Decimal::ONE;
        }
        (self.filled / self.expected).min(Decimal::ONE)
    }

    /// Count opposite-side tape trades in `[last_checked, now)`.
    ///
    /// A buy fills by traded quantity. A sell fills by quantity valued at
    /// the order's limit price. Returns whether the order is now filled.
    pub fn replay(&mut self, tape: &[TapeTrade], now: DateTime<Utc>) -> bool {
        if now <= self.last_checked {
            return self.is_filled();
        }
        let counter_side = self.side.opposite();
        let window_fill: Decimal = tape
            .iter()
            .filter(|t| t.side == counter_side)
            .filter(|t| t.timestamp >= self.last_checked && t.timestamp < now)
            .map(|t| match self.side {
                Side::Buy => t.quantity,
                Side::Sell => t.quantity * self.limit_price,
            })
            .sum();

        self.filled += window_fill;
        self.last_checked = now;
        self.is_filled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn trade(side: Side, quantity: Decimal, at: DateTime<Utc>) -> TapeTrade {
        TapeTrade {
            price: dec!(10),
            quantity,
            side,
            timestamp: at,
        }
    }

    #[test]
    fn test_buy_fills_from_sell_side() {
        let t0 = Utc::now();
        let mut ledger = SimulationLedger::open(Side::Buy, dec!(10), dec!(10), t0);
        let tape = vec![
            trade(Side::Sell, dec!(4), t0 + Duration::seconds(1)),
            trade(Side::Buy, dec!(50), t0 + Duration::seconds(2)),
            trade(Side::Sell, dec!(7), t0 + Duration::seconds(3)),
        ];

        assert!(ledger.replay(&tape, t0 + Duration::seconds(10)));
        assert_eq!(ledger.filled(), dec!(11));
    }

    #[test]
    fn test_sell_fills_at_limit_price() {
        let t0 = Utc::now();
        let mut ledger = SimulationLedger::open(Side::Sell, dec!(60), dec!(6), t0);
        let tape = vec![trade(Side::Buy, dec!(4), t0 + Duration::seconds(1))];

        assert!(!ledger.replay(&tape, t0 + Duration::seconds(5)));
        assert_eq!(ledger.filled(), dec!(24));
        assert_eq!(ledger.fill_ratio(), dec!(0.4));
    }

    #[test]
    fn test_old_trades_are_ignored() {
        let t0 = Utc::now();
        let mut ledger = SimulationLedger::open(Side::Buy, dec!(1), dec!(10), t0);
        let tape = vec![trade(Side::Sell, dec!(5), t0 - Duration::seconds(1))];

        assert!(!ledger.replay(&tape, t0 + Duration::seconds(5)));
        assert_eq!(ledger.filled(), Decimal::ZERO);
    }

    #[test]
    fn test_same_tape_is_not_counted_twice() {
        let t0 = Utc::now();
        let mut ledger = SimulationLedger::open(Side::Buy, dec!(100), dec!(10), t0);
        let tape = vec![trade(Side::Sell, dec!(5), t0 + Duration::seconds(1))];

        ledger.replay(&tape, t0 + Duration::seconds(2));
        ledger.replay(&tape, t0 + Duration::seconds(4));
        assert_eq!(ledger.filled(), dec!(5));
        assert_eq!(ledger.last_checked(), t0 + Duration::seconds(4));
    }

    #[test]
    fn test_clock_going_backwards_changes_nothing() {
        let t0 = Utc::now();
        let mut ledger = SimulationLedger::open(Side::Buy, dec!(1), dec!(10), t0);
        let tape = vec![trade(Side::Sell, dec!(5), t0 - Duration::seconds(1))];
        assert!(!ledger.replay(&tape, t0 - Duration::seconds(5)));
        assert_eq!(ledger.last_checked(), t0);
    }

    proptest! {
        #[test]
        fn prop_split_checks_match_single_scan(
            offsets in proptest::collection::vec((0i64..1_000, 1u32..50, any::<bool>()), 0..40),
            mut checks in proptest::collection::vec(1i64..1_100, 0..10),
        ) {
            let t0 = Utc::now();
            let tape: Vec<TapeTrade> = offsets
                .iter()
                .map(|(ms, qty, sell)| {
                    let side = if *sell { Side::Sell } else { Side::Buy };
                    trade(side, Decimal::from(*qty), t0 + Duration::milliseconds(*ms))
                })
                .collect();
            let end = t0 + Duration::milliseconds(1_100);

            let mut single = SimulationLedger::open(Side::Buy, dec!(1000000), dec!(10), t0);
            single.replay(&tape, end);

            checks.sort_unstable();
            let mut split = SimulationLedger::open(Side::Buy, dec!(1000000), dec!(10), t0);
            for ms in checks {
                split.replay(&tape, t0 + Duration::milliseconds(ms));
            }
            split.replay(&tape, end);

            prop_assert_eq!(split.filled(), single.filled());
        }
    }
}
