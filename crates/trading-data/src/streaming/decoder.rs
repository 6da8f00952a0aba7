//! Frame classification for streaming feeds.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use trading_core::types::{FeedQuote, Quote};

/// What one inbound text frame means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Quote(FeedQuote),
    /// The server reported an error; the stream should be closed
    ProtocolError(String),
    /// Heartbeats, subscription acks and anything of the wrong shape
    Ignored,
}

/// Turns text frames into [`Frame`]s.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, text: &str) -> Frame;
}

/// Decoder for ticker updates sent as fixed-length JSON arrays.
///
/// The defaults match a channel-prefixed ticker array of 11 fields with the
/// last price at index 7. Configure `bid_index` and `ask_index` to emit
/// order book quotes instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerArrayDecoder {
    pub fields: usize,
    pub price_index: usize,
    pub bid_index: Option<usize>,
    pub ask_index: Option<usize>,
}

impl Default for TickerArrayDecoder {
    fn default() -> Self {
        Self {
            fields: 11,
            price_index: 7,
            bid_index: None,
            ask_index: None,
        }
    }
}

fn decimal_at(values: &[Value], index: usize) -> Option<Decimal> {
    match values.get(index)? {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

impl FrameDecoder for TickerArrayDecoder {
    fn decode(&self, text: &str) -> Frame {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Frame::Ignored;
        };

        match value {
            Value::Array(values) if values.len() == self.fields => {
                let quote = match (self.bid_index, self.ask_index) {
                    (Some(bid), Some(ask)) => decimal_at(&values, bid)
                        .zip(decimal_at(&values, ask))
                        .map(|(bid, ask)| Quote::Book { bid, ask }),
                    _ => decimal_at(&values, self.price_index).map(|price| Quote::Last { price }),
                };
                quote.map_or(Frame::Ignored, |q| Frame::Quote(FeedQuote::new(q)))
            }
            Value::Object(map) if map.get("event").and_then(Value::as_str) == Some("error") => {
                let message = map
                    .get("msg")
                    .or_else(|| map.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified error");
                Frame::ProtocolError(message.to_string())
            }
            _ => Frame::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TICKER: &str = "[2,236.62,9.0029,236.88,7.1138,-1.02,0,236.52,5191.36,250.0,219.92]";

    #[test]
    fn test_last_price_at_index() {
        let frame = TickerArrayDecoder::default().decode(TICKER);
        assert_eq!(
            frame,
            Frame::Quote(FeedQuote::new(Quote::Last {
                price: dec!(236.52)
            }))
        );
    }

    #[test]
    fn test_book_from_bid_and_ask_indexes() {
        let decoder = TickerArrayDecoder {
            bid_index: Some(1),
            ask_index: Some(3),
            ..Default::default()
        };
        assert_eq!(
            decoder.decode(TICKER),
            Frame::Quote(FeedQuote::new(Quote::Book {
                bid: dec!(236.62),
                ask: dec!(236.88)
            }))
        );
    }

    #[test]
    fn test_wrong_shape_is_ignored() {
        let decoder = TickerArrayDecoder::default();
        assert_eq!(decoder.decode(r#"[2,"hb"]"#), Frame::Ignored);
        assert_eq!(decoder.decode(r#"{"event":"subscribed","chanId":2}"#), Frame::Ignored);
        assert_eq!(decoder.decode("not json"), Frame::Ignored);
    }

    #[test]
    fn test_error_event_is_a_protocol_error() {
        let decoder = TickerArrayDecoder::default();
        assert_eq!(
            decoder.decode(r#"{"event":"error","msg":"symbol: invalid","code":10300}"#),
            Frame::ProtocolError("symbol: invalid".into())
        );
    }
}
