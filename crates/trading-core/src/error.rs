//! Error types for the trading system.

use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    /// A caller broke a documented precondition.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Strategy not found: {0}")]
    NotFound(String),
}

/// Errors raised by exchange order and account collaborators.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Not supported by this exchange: {0}")]
    Unsupported(String),
}

/// Market data errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not supported by this feed: {0}")]
    Unsupported(String),

    #[error("Data source error: {0}")]
    Internal(String),
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_converts() {
        let err: TradingError = BrokerError::OrderNotFound("abc".into()).into();
        assert!(matches!(err, TradingError::Broker(BrokerError::OrderNotFound(_))));
        assert_eq!(err.to_string(), "Broker error: Order not found: abc");
    }

    #[test]
    fn test_errors_are_exported_at_the_crate_root() {
        let err: crate::TradingError = crate::DataError::Protocol("bad channel".into()).into();
        assert_eq!(err.to_string(), "Data error: Protocol error: bad channel");
        let err: crate::TradingError = crate::BrokerError::Unsupported("cancel".into()).into();
        assert!(matches!(err, TradingError::Broker(_)));
    }
}
