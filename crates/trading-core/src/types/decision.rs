//! Trading decisions emitted by strategies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a strategy wants its traders to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Currency a trader rests in when no trade is profitable.
///
/// `Buy` rests in the major currency, `Sell` in the minor currency, and
/// `Hold` keeps whatever is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPosition {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl fmt::Display for DefaultPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultPosition::Buy => write!(f, "buy"),
            DefaultPosition::Sell => write!(f, "sell"),
            DefaultPosition::Hold => write!(f, "hold"),
        }
    }
}

/// A ternary trading decision plus its reference price.
///
/// Produced by a strategy and consumed once by every attached observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub price: Decimal,
    /// Default-position bias carried by `Hold` decisions.
    pub bias: Option<DefaultPosition>,
    /// Market to trade, for strategies that pick their own market.
    pub market: Option<String>,
    /// Explicit quantity override for single-trade observers.
    pub quantity: Option<Decimal>,
}

impl Decision {
    fn with_action(action: Action, price: Decimal) -> Self {
        Self {
            action,
            price,
            bias: None,
            market: None,
            quantity: None,
        }
    }

    pub fn buy(price: Decimal) -> Self {
        Self::with_action(Action::Buy, price)
    }

    pub fn sell(price: Decimal) -> Self {
        Self::with_action(Action::Sell, price)
    }

    pub fn hold(price: Decimal, bias: DefaultPosition) -> Self {
        Self {
            bias: Some(bias),
            ..Self::with_action(Action::Hold, price)
        }
    }

    /// Redirect the decision to a specific market.
    pub fn for_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    /// Override the quantity a single-trade observer should trade.
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decision_builders() {
        let d = Decision::buy(dec!(10)).for_market("ETH_BTC").with_quantity(dec!(2));
        assert_eq!(d.action, Action::Buy);
        assert_eq!(d.market.as_deref(), Some("ETH_BTC"));
        assert_eq!(d.quantity, Some(dec!(2)));
        assert!(d.bias.is_none());

        let h = Decision::hold(dec!(5), DefaultPosition::Sell);
        assert_eq!(h.action, Action::Hold);
        assert_eq!(h.bias, Some(DefaultPosition::Sell));
    }

    #[test]
    fn test_default_position_parses_lowercase() {
        let p: DefaultPosition = serde_json::from_str("\"buy\"").unwrap();
        assert_eq!(p, DefaultPosition::Buy);
        assert_eq!(DefaultPosition::default(), DefaultPosition::Hold);
    }
}
