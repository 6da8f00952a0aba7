//! Balance/asset accounting with an explicit two-phase commit.
//!
//! Placing an order moves everything on the spending side into a
//! [`Reservation`]. The reservation is consumed exactly once, either by
//! [`Account::settle`] when the order resolves or by [`Account::release`]
//! when it never reached the exchange.

use rust_decimal::Decimal;
use serde::Serialize;
use trading_core::precision::significant;
use trading_core::Side;

/// Funds committed to one outstanding order.
///
/// Not `Clone`: holding the token is holding the commitment.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be settled or released"]
pub struct Reservation {
    side: Side,
    amount: Decimal,
}

impl Reservation {
    /// Order side the funds were reserved for.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Reserved amount: minor currency for a buy, major currency for a sell.
    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

/// How a reservation resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Settlement {
    /// Unspent part returned to the side that was reserved
    pub refund: Decimal,
    /// Amount credited to the opposite side, net of fees
    pub proceeds: Decimal,
}

/// A trader's internally held funds.
///
/// `balance` is in the minor currency (what buys spend), `assets` in the
/// major currency (what sells spend). Both stay non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    balance: Decimal,
    assets: Decimal,
}

impl Account {
    pub fn new(balance: Decimal, assets: Decimal) -> Self {
        Self {
            balance: significant(balance.max(Decimal::ZERO)),
            assets: significant(assets.max(Decimal::ZERO)),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn assets(&self) -> Decimal {
        self.assets
    }

    /// Funds an order on `side` would spend.
    pub fn available(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.balance,
            Side::Sell => self.assets,
        }
    }

    pub fn set_balance(&mut self, balance: Decimal) {
        self.balance = significant(balance.max(Decimal::ZERO));
    }

    pub fn set_assets(&mut self, assets: Decimal) {
        self.assets = significant(assets.max(Decimal::ZERO));
    }

    /// Commit the whole spending side to an order, zeroing it.
    pub fn reserve(&mut self, side: Side) -> Reservation {
        let field = self.field(side);
        let amount = std::mem::take(field);
        Reservation { side, amount }
    }

    /// Resolve a reservation: refund the unspent part, credit the proceeds.
    ///
    /// A refund larger than the reservation is clamped to it.
    pub fn settle(&mut self, reservation: Reservation, settlement: Settlement) {
        let refund = settlement.refund.clamp(Decimal::ZERO, reservation.amount);
        let proceeds = settlement.proceeds.max(Decimal::ZERO);

        let spent_side = self.field(reservation.side);
        *spent_side = significant(*spent_side + refund);
        let credited_side = self.field(reservation.side.opposite());
        *credited_side = significant(*credited_side + proceeds);
    }

    /// Return a reservation untouched.
    pub fn release(&mut self, reservation: Reservation) {
        let amount = reservation.amount;
        self.settle(
            reservation,
            Settlement {
                refund: amount,
                proceeds: Decimal::ZERO,
            },
        );
    }

    /// Value of both sides in the minor currency at `price`.
    pub fn value_at(&self, price: Decimal) -> Decimal {
        self.balance + self.assets * price
    }

    fn field(&mut self, side: Side) -> &mut Decimal {
        match side {
            Side::Buy => &mut self.balance,
            Side::Sell => &mut self.assets,
        }
    }
}
