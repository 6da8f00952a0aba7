//! Decimal precision helpers.
//!
//! Balances and assets are kept to a fixed number of significant digits so
//! that many small trades do not accumulate rounding noise.

use rust_decimal::{Decimal, RoundingStrategy};

/// Significant digits kept for every stored financial quantity.
pub const SIGNIFICANT_DIGITS: u32 = 8;

/// Round to [`SIGNIFICANT_DIGITS`] significant digits.
pub fn significant(value: Decimal) -> Decimal {
    if value.is_zero() {
        return value;
    }
    value.round_sf(SIGNIFICANT_DIGITS).unwrap_or(value).normalize()
}

/// Truncate an order quantity to the exchange's amount precision.
///
/// Truncation never asks the exchange for more than the account holds.
pub fn truncate_quantity(quantity: Decimal, decimals: u32) -> Decimal {
    quantity.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Round a limit price to the exchange's price precision.
pub fn round_price(price: Decimal, decimals: u32) -> Decimal {
    price.round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven)
}
