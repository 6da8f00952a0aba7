//! Public REST market data and trade tape.
//!
//! Exchanges differ mostly in where they put the same few numbers, so the
//! endpoints are described by configuration: URL templates with a
//! `{market}` placeholder, JSON pointers for the top of book, and field
//! names for trade tape entries. Nothing here is authenticated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use trading_core::error::{BrokerError, DataError};
use trading_core::traits::{MarketFeed, TradeTape};
use trading_core::types::{FeedQuote, MarketSnapshot, Quote, Side, TapeTrade};

/// Unit of numeric timestamps in exchange responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    Seconds,
    Millis,
}

/// Where each trade tape field lives in one tape entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeFields {
    pub price: String,
    pub quantity: String,
    pub side: String,
    /// Value of `side` that marks an aggressive buy
    pub buy_marker: String,
    pub timestamp: String,
    pub timestamp_unit: TimestampUnit,
}

impl Default for TradeFields {
    fn default() -> Self {
        Self {
            price: "price".into(),
            quantity: "qty".into(),
            side: "isBuyerMaker".into(),
            buy_marker: "false".into(),
            timestamp: "time".into(),
            timestamp_unit: TimestampUnit::Millis,
        }
    }
}

/// Endpoint description for one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEndpoints {
    /// Order book URL template
    pub order_book: String,
    /// JSON pointer to the best bid in the order book response
    pub best_bid: String,
    /// JSON pointer to the best ask in the order book response
    pub best_ask: String,
    /// Recent trades URL template
    pub trades: Option<String>,
    /// JSON pointer to the trade array (empty for a top-level array)
    pub trades_pointer: String,
    pub trade_fields: TradeFields,
    /// Server time URL
    pub server_time: Option<String>,
    pub server_time_pointer: String,
    pub server_time_unit: TimestampUnit,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpEndpoints {
    fn default() -> Self {
        Self {
            order_book: "https://api.binance.com/api/v3/depth?symbol={market}&limit=5".into(),
            best_bid: "/bids/0/0".into(),
            best_ask: "/asks/0/0".into(),
            trades: Some("https://api.binance.com/api/v3/trades?symbol={market}&limit=500".into()),
            trades_pointer: String::new(),
            trade_fields: TradeFields::default(),
            server_time: Some("https://api.binance.com/api/v3/time".into()),
            server_time_pointer: "/serverTime".into(),
            server_time_unit: TimestampUnit::Millis,
            timeout_secs: 15,
        }
    }
}

/// REST client for one exchange's public endpoints.
pub struct HttpExchange {
    name: String,
    endpoints: HttpEndpoints,
    client: Client,
}

impl HttpExchange {
    /// Create a new client.
    pub fn new(name: impl Into<String>, endpoints: HttpEndpoints) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoints.timeout_secs))
            .build()
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            endpoints,
            client,
        })
    }

    pub fn endpoints(&self) -> &HttpEndpoints {
        &self.endpoints
    }

    /// GET a URL and parse the body as JSON.
    ///
    /// `Ok(None)` means the exchange answered "no such market".
    async fn get_json(&self, url: &str) -> Result<Option<serde_json::Value>, DataError> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DataError::ConnectionError(format!("{status}: {text}")));
        }

        resp.json()
            .await
            .map(Some)
            .map_err(|e| DataError::ParseError(e.to_string()))
    }
}

fn market_url(template: &str, market: &str) -> String {
    template.replace("{market}", market)
}

/// Read a decimal that may be encoded as a JSON string or number.
pub fn decimal_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .ok(),
        serde_json::Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        _ => None,
    }
}

fn timestamp_value(value: &serde_json::Value, unit: TimestampUnit) -> Option<DateTime<Utc>> {
    let raw = decimal_value(value)?;
    let millis = match unit {
        TimestampUnit::Seconds => raw * Decimal::ONE_THOUSAND,
        TimestampUnit::Millis => raw,
    };
    DateTime::from_timestamp_millis(millis.trunc().to_i64()?)
}

fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract the top of book from an order book response.
pub fn parse_book(body: &serde_json::Value, endpoints: &HttpEndpoints) -> Option<Quote> {
    let bid = body.pointer(&endpoints.best_bid).and_then(decimal_value)?;
    let ask = body.pointer(&endpoints.best_ask).and_then(decimal_value)?;
    Some(Quote::Book { bid, ask })
}

/// Extract tape entries from a trades response, skipping malformed ones.
pub fn parse_trades(body: &serde_json::Value, endpoints: &HttpEndpoints) -> Vec<TapeTrade> {
    let fields = &endpoints.trade_fields;
    let entries = if endpoints.trades_pointer.is_empty() {
        body.as_array()
    } else {
        body.pointer(&endpoints.trades_pointer)
            .and_then(|v| v.as_array())
    };

    entries
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let side = if field_text(entry.get(&fields.side)?) == fields.buy_marker {
                Side::Buy
            } else {
                Side::Sell
            };
            Some(TapeTrade {
                price: entry.get(&fields.price).and_then(decimal_value)?,
                quantity: entry.get(&fields.quantity).and_then(decimal_value)?,
                side,
                timestamp: timestamp_value(entry.get(&fields.timestamp)?, fields.timestamp_unit)?,
            })
        })
        .collect()
}

#[async_trait]
impl MarketFeed for HttpExchange {
    async fn fetch_snapshot(&self, market: &str) -> Result<MarketSnapshot, DataError> {
        let url = market_url(&self.endpoints.order_book, market);
        let Some(body) = self.get_json(&url).await? else {
            return Ok(MarketSnapshot::Unavailable);
        };

        // An empty book is as good as an unlisted market
        Ok(parse_book(&body, &self.endpoints)
            .map(|quote| MarketSnapshot::Available(FeedQuote::new(quote)))
            .unwrap_or(MarketSnapshot::Unavailable))
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, DataError> {
        let url = self
            .endpoints
            .server_time
            .as_deref()
            .ok_or_else(|| DataError::Unsupported("server time".into()))?;
        let body = self
            .get_json(url)
            .await?
            .ok_or_else(|| DataError::ParseError("empty server time response".into()))?;

        body.pointer(&self.endpoints.server_time_pointer)
            .and_then(|v| timestamp_value(v, self.endpoints.server_time_unit))
            .ok_or_else(|| DataError::ParseError("server time not found in response".into()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TradeTape for HttpExchange {
    async fn get_recent_trades(
        &self,
        market: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TapeTrade>, BrokerError> {
        let template = self
            .endpoints
            .trades
            .as_deref()
            .ok_or_else(|| BrokerError::Unsupported("trade history".into()))?;
        let url = market_url(template, market);

        let body = self
            .get_json(&url)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?
            .ok_or_else(|| BrokerError::ApiError(format!("Market {market} not listed")))?;

        let mut trades = parse_trades(&body, &self.endpoints);
        trades.retain(|t| t.timestamp >= since);
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_book_from_string_levels() {
        let body = json!({
            "lastUpdateId": 1,
            "bids": [["100.50", "2.0"], ["100.00", "1.0"]],
            "asks": [["101.25", "0.5"]]
        });
        let quote = parse_book(&body, &HttpEndpoints::default()).unwrap();
        assert_eq!(
            quote,
            Quote::Book {
                bid: dec!(100.50),
                ask: dec!(101.25)
            }
        );
    }

    #[test]
    fn test_empty_book_has_no_quote() {
        let body = json!({ "bids": [], "asks": [] });
        assert!(parse_book(&body, &HttpEndpoints::default()).is_none());
    }

    #[test]
    fn test_parse_trades_reads_aggressor_side() {
        let body = json!([
            { "id": 1, "price": "100.0", "qty": "0.5", "time": 1_700_000_000_000i64, "isBuyerMaker": true },
            { "id": 2, "price": "100.5", "qty": "1.5", "time": 1_700_000_001_000i64, "isBuyerMaker": false },
            { "id": 3, "price": "bad", "qty": "1", "time": 1_700_000_002_000i64, "isBuyerMaker": false }
        ]);
        let trades = parse_trades(&body, &HttpEndpoints::default());

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[1].side, Side::Buy);
        assert_eq!(trades[1].quantity, dec!(1.5));
        assert_eq!(trades[0].timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_trades_under_pointer_in_seconds() {
        let endpoints = HttpEndpoints {
            trades_pointer: "/result".into(),
            trade_fields: TradeFields {
                price: "rate".into(),
                quantity: "amount".into(),
                side: "type".into(),
                buy_marker: "buy".into(),
                timestamp: "date".into(),
                timestamp_unit: TimestampUnit::Seconds,
            },
            ..Default::default()
        };
        let body = json!({ "result": [
            { "rate": 0.031, "amount": "12", "type": "sell", "date": "1700000000.5" }
        ]});
        let trades = parse_trades(&body, &endpoints);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(0.031));
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].timestamp.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_market_url() {
        assert_eq!(
            market_url("https://x/{market}/book", "BTC_USD"),
            "https://x/BTC_USD/book"
        );
    }

    #[test]
    fn test_decimal_value() {
        assert_eq!(decimal_value(&json!("1.5")), Some(dec!(1.5)));
        assert_eq!(decimal_value(&json!(2)), Some(dec!(2)));
        assert_eq!(decimal_value(&json!("1e-3")), Some(dec!(0.001)));
        assert_eq!(decimal_value(&json!(null)), None);
    }
}
