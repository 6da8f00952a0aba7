//! Spread profitability.
//!
//! A round trip buys at the bid and sells at the ask, paying the fee on both
//! legs. The spread is worth trading when what is kept after both fees still
//! beats the minimum return.

use rust_decimal::Decimal;
use trading_core::error::IndicatorError;

/// Tests whether a bid/ask spread covers a round-trip fee plus a minimum return.
#[derive(Debug, Clone)]
pub struct SpreadSize {
    minimum_return: Decimal,
    /// (1 - fee)^2
    keep_after_fees: Decimal,
}

impl SpreadSize {
    /// Create a new spread test.
    ///
    /// # Arguments
    /// * `minimum_return` - Required multiplier on capital, e.g. `1.005`
    /// * `fee` - Fee fraction charged per leg, e.g. `0.0025`
    pub fn new(minimum_return: Decimal, fee: Decimal) -> Result<Self, IndicatorError> {
        if minimum_return <= Decimal::ONE {
            return Err(IndicatorError::InvalidParameter(format!(
                "minimum return must exceed 1, got {minimum_return}"
            )));
        }
        if fee < Decimal::ZERO || fee >= Decimal::ONE {
            return Err(IndicatorError::InvalidParameter(format!(
                "fee must be in [0, 1), got {fee}"
            )));
        }
        let keep = Decimal::ONE - fee;
        Ok(Self {
            minimum_return,
            keep_after_fees: keep * keep,
        })
    }

    pub fn minimum_return(&self) -> Decimal {
        self.minimum_return
    }

    /// True when `ask - bid > minimum_return * bid / (1 - fee)^2 - bid`.
    ///
    /// A non-positive bid is never profitable.
    pub fn is_profitable(&self, bid: Decimal, ask: Decimal) -> bool {
        if bid <= Decimal::ZERO {
            return false;
        }
        match (self.minimum_return * bid).checked_div(self.keep_after_fees) {
            Some(required) => ask - bid > required - bid,
            None => false,
        }
    }

    /// Capital multiplier of buying at `bid` and selling at `ask`, net of fees.
    pub fn expected_return(&self, bid: Decimal, ask: Decimal) -> Option<Decimal> {
        if bid <= Decimal::ZERO {
            return None;
        }
        ask.checked_div(bid).map(|ratio| self.keep_after_fees * ratio)
    }
}
