//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trading_broker::{ExchangeOptions, HttpEndpoints, TraderConfig};
use trading_core::{DefaultPosition, TradingError, TradingResult};
use trading_data::{StreamingSettings, TickerArrayDecoder};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub trader: TraderSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "cryptotrader".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily-rolling log files
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// The exchange traded on and its per-exchange parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub name: String,
    pub market: String,
    pub major_currency: String,
    pub minor_currency: String,
    pub fee: Decimal,
    pub minimum_trade: Decimal,
    /// Price improvement over the best bid/ask for spread orders
    pub undercut: Decimal,
    pub amount_decimals: u32,
    pub price_decimals: u32,
    pub http: HttpEndpoints,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            name: "binance".to_string(),
            market: "BTCUSDT".to_string(),
            major_currency: "BTC".to_string(),
            minor_currency: "USDT".to_string(),
            fee: dec!(0.001),
            minimum_trade: dec!(0.00001),
            undercut: dec!(0.01),
            amount_decimals: 5,
            price_decimals: 2,
            http: HttpEndpoints::default(),
        }
    }
}

impl ExchangeSettings {
    pub fn options(&self) -> ExchangeOptions {
        ExchangeOptions {
            fee: self.fee,
            minimum_trade: self.minimum_trade,
            amount_decimals: self.amount_decimals,
            price_decimals: self.price_decimals,
        }
    }
}

/// How market data is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    #[default]
    Polling,
    Streaming,
}

/// Field layout for streamed ticker arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    pub fields: usize,
    pub price_index: usize,
    pub bid_index: Option<usize>,
    pub ask_index: Option<usize>,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        let decoder = TickerArrayDecoder::default();
        Self {
            fields: decoder.fields,
            price_index: decoder.price_index,
            bid_index: Some(1),
            ask_index: Some(3),
        }
    }
}

/// Market data pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub mode: PipelineMode,
    pub poll_interval_secs: u64,
    pub keepalive_secs: u64,
    pub reset_interval_secs: u64,
    pub websocket_url: String,
    pub subscribe: Option<String>,
    pub decoder: DecoderSettings,
    /// Server time round trips for the latency probe; 0 disables it
    pub latency_samples: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Polling,
            poll_interval_secs: 15,
            keepalive_secs: 30,
            reset_interval_secs: 15 * 60,
            websocket_url: "wss://api.bitfinex.com/ws".to_string(),
            subscribe: Some(
                r#"{"event":"subscribe","channel":"ticker","pair":"BTCUSD"}"#.to_string(),
            ),
            decoder: DecoderSettings::default(),
            latency_samples: 8,
        }
    }
}

impl PipelineSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn streaming(&self) -> StreamingSettings {
        StreamingSettings {
            keepalive: Duration::from_secs(self.keepalive_secs),
            reset_interval: Duration::from_secs(self.reset_interval_secs),
        }
    }

    pub fn decoder(&self) -> TickerArrayDecoder {
        TickerArrayDecoder {
            fields: self.decoder.fields,
            price_index: self.decoder.price_index,
            bid_index: self.decoder.bid_index,
            ask_index: self.decoder.ask_index,
        }
    }
}

/// Strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub name: String,
    /// Passed to the strategy registry; missing keys take defaults
    pub params: serde_json::Value,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: "spread".to_string(),
            params: serde_json::json!({
                "minimum_return": "1.005",
                "default_position": "sell",
            }),
        }
    }
}

/// How traders follow the strategy's decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObserverKind {
    /// Trade the configured market with the whole balance
    #[default]
    Standard,
    /// Trade the market and quantity each decision names, once
    SingleTrade,
}

/// Trader settings, shared by every split trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderSettings {
    pub percentage_to_trade: Decimal,
    pub start_by_buying: bool,
    pub starting_amount: Decimal,
    pub default_position: DefaultPosition,
    pub aggressive: bool,
    /// Number of traders the share is split across
    pub traders: usize,
    pub observer: ObserverKind,
}

impl Default for TraderSettings {
    fn default() -> Self {
        Self {
            percentage_to_trade: Decimal::ONE,
            start_by_buying: true,
            starting_amount: dec!(100),
            default_position: DefaultPosition::Sell,
            aggressive: false,
            traders: 1,
            observer: ObserverKind::Standard,
        }
    }
}

impl AppConfig {
    /// Check the cross-section constraints deserialization cannot.
    pub fn validate(&self) -> TradingResult<()> {
        if self.pipeline.poll_interval_secs == 0 {
            return Err(TradingError::Config("Poll interval must be positive".into()));
        }
        if self.pipeline.keepalive_secs == 0 || self.pipeline.reset_interval_secs == 0 {
            return Err(TradingError::Config(
                "Keepalive and reset intervals must be positive".into(),
            ));
        }
        let decoder = &self.pipeline.decoder;
        let indexes = [Some(decoder.price_index), decoder.bid_index, decoder.ask_index];
        if indexes.into_iter().flatten().any(|i| i >= decoder.fields) {
            return Err(TradingError::Config(format!(
                "Decoder indexes must be below the field count {}",
                decoder.fields
            )));
        }
        if !self.strategy.params.is_object() && !self.strategy.params.is_null() {
            return Err(TradingError::Config("Strategy params must be a table".into()));
        }
        if self.strategy.name == "fast_buy" && self.trader.observer != ObserverKind::SingleTrade {
            return Err(TradingError::Config(
                "The fast_buy strategy needs single_trade observers".into(),
            ));
        }
        self.trader_configs().map(|_| ())
    }

    /// Configs for every split trader.
    pub fn trader_configs(&self) -> TradingResult<Vec<TraderConfig>> {
        let settings = &self.trader;
        let base = TraderConfig {
            exchange: self.exchange.options(),
            percentage_to_trade: settings.percentage_to_trade,
            start_by_buying: settings.start_by_buying,
            starting_amount: settings.starting_amount,
            default_position: settings.default_position,
            aggressive: settings.aggressive,
            ..TraderConfig::new(
                &self.exchange.market,
                &self.exchange.major_currency,
                &self.exchange.minor_currency,
            )
        };
        base.validate()?;
        base.split(settings.traders)
    }

    /// Strategy parameters with exchange and trader values filled in where
    /// the strategy takes them and they are not given explicitly.
    ///
    /// The spread strategy takes the exchange fee and undercut. The fast buy
    /// strategy takes the fee and one trader's starting amount as its budget.
    pub fn strategy_params(&self) -> serde_json::Value {
        let mut params = self.strategy.params.clone();
        if params.is_null() {
            params = serde_json::Value::Object(Default::default());
        }
        let Some(map) = params.as_object_mut() else {
            return params;
        };
        match self.strategy.name.as_str() {
            "spread" => {
                map.entry("fee")
                    .or_insert_with(|| self.exchange.fee.to_string().into());
                map.entry("undercut")
                    .or_insert_with(|| self.exchange.undercut.to_string().into());
            }
            "fast_buy" => {
                map.entry("fee")
                    .or_insert_with(|| self.exchange.fee.to_string().into());
                let traders = Decimal::from(self.trader.traders.max(1));
                let budget = self.trader.starting_amount / traders;
                map.entry("balance_to_spend")
                    .or_insert_with(|| budget.normalize().to_string().into());
            }
            _ => {}
        }
        params
    }
}
