//! Market observation types.

use super::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price reading from an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Quote {
    /// Last traded price (ticker feeds).
    Last { price: Decimal },
    /// Best bid and best ask (order book feeds).
    Book { bid: Decimal, ask: Decimal },
}

impl Quote {
    /// Price a trend strategy should follow: the last trade, or the book mid.
    pub fn reference_price(&self) -> Decimal {
        match self {
            Quote::Last { price } => *price,
            Quote::Book { bid, ask } => (*bid + *ask) / Decimal::TWO,
        }
    }

    /// Best bid and ask, if this quote came from an order book.
    pub fn book(&self) -> Option<(Decimal, Decimal)> {
        match self {
            Quote::Book { bid, ask } => Some((*bid, *ask)),
            Quote::Last { .. } => None,
        }
    }
}

/// What a feed saw for one market on one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuote {
    pub quote: Quote,
    /// Exchange-supplied timestamp, when the feed carries one.
    pub timestamp: Option<DateTime<Utc>>,
}

impl FeedQuote {
    pub fn new(quote: Quote) -> Self {
        Self {
            quote,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Result of asking a feed about a single market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketSnapshot {
    Available(FeedQuote),
    /// The exchange does not list the market (or it is halted).
    Unavailable,
}

/// A timestamped observation handed from a pipeline to a strategy.
///
/// Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub market: String,
    pub quote: Quote,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub fn new(market: impl Into<String>, quote: Quote, timestamp: DateTime<Utc>) -> Self {
        Self {
            market: market.into(),
            quote,
            timestamp,
        }
    }

    /// Shorthand for a last-price observation.
    pub fn last(market: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self::new(market, Quote::Last { price }, timestamp)
    }

    /// Shorthand for an order book observation.
    pub fn book(
        market: impl Into<String>,
        bid: Decimal,
        ask: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(market, Quote::Book { bid, ask }, timestamp)
    }
}

/// One entry of an exchange's public trade tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeTrade {
    pub price: Decimal,
    pub quantity: Decimal,
    /// Aggressor side. A `Sell` trade hit resting bids.
    pub side: Side,
    pub timestamp: DateTime<Utc>,
}
