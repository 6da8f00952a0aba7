//! Fixed-interval polling source.

use crate::latency::LatencyOffset;
use crate::pipeline::{deliver, MarketDataSource, StopSignal};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use trading_core::error::DataError;
use trading_core::traits::{MarketFeed, ObservationHandler};
use trading_core::types::{FeedQuote, MarketSnapshot, Observation};
use trading_core::{Clock, SystemClock};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// What a polling source fetches each cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// One market's ticker or order book
    Market(String),
    /// Every listed market quoted in the given minor currency
    QuotedIn(String),
}

/// Polls a [`MarketFeed`] on a fixed interval.
///
/// Missed ticks are skipped rather than queued; only the latest snapshot
/// matters.
pub struct PollingSource {
    feed: Arc<dyn MarketFeed>,
    target: PollTarget,
    interval: Duration,
    clock: Arc<dyn Clock>,
    latency: LatencyOffset,
}

impl PollingSource {
    pub fn new(feed: Arc<dyn MarketFeed>, target: PollTarget) -> Self {
        Self {
            feed,
            target,
            interval: DEFAULT_POLL_INTERVAL,
            clock: Arc::new(SystemClock),
            latency: LatencyOffset::zero(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_latency(mut self, latency: LatencyOffset) -> Self {
        self.latency = latency;
        self
    }

    /// Fetch once and deliver what was found.
    ///
    /// # Returns
    /// Number of observations handed to the handler
    pub async fn poll_once(&self, handler: &mut dyn ObservationHandler) -> usize {
        match &self.target {
            PollTarget::Market(market) => match self.feed.fetch_snapshot(market).await {
                Ok(MarketSnapshot::Available(quote)) => {
                    deliver(handler, self.observe(market, quote)).await;
                    1
                }
                Ok(MarketSnapshot::Unavailable) => {
                    debug!(%market, "Market unavailable, skipping");
                    0
                }
                Err(e) => {
                    warn!(%market, error = %e, "Poll failed, retrying next cycle");
                    0
                }
            },
            PollTarget::QuotedIn(minor) => match self.feed.fetch_market_summaries().await {
                Ok(summaries) => {
                    let mut delivered = 0;
                    for (market, quote) in summaries {
                        if quoted_in(&market, minor) {
                            deliver(handler, self.observe(&market, quote)).await;
                            delivered += 1;
                        }
                    }
                    delivered
                }
                Err(e) => {
                    warn!(%minor, error = %e, "Summary poll failed, retrying next cycle");
                    0
                }
            },
        }
    }

    fn observe(&self, market: &str, quote: FeedQuote) -> Observation {
        let timestamp = quote
            .timestamp
            .unwrap_or_else(|| self.latency.apply(self.clock.now()));
        Observation::new(market, quote.quote, timestamp)
    }
}

/// Whether `market` is quoted in `minor`, for names like `BTC_USD`,
/// `USD-BTC`, `BTC/USD` or `BTCUSD`.
fn quoted_in(market: &str, minor: &str) -> bool {
    let market = market.to_ascii_uppercase();
    let minor = minor.to_ascii_uppercase();
    if market.contains(['_', '-', '/']) {
        market.split(['_', '-', '/']).any(|part| part == minor)
    } else {
        market.len() > minor.len() && market.ends_with(&minor)
    }
}

#[async_trait]
impl MarketDataSource for PollingSource {
    fn name(&self) -> &str {
        self.feed.name()
    }

    async fn run(
        &mut self,
        handler: &mut dyn ObservationHandler,
        stop: &mut StopSignal,
    ) -> Result<(), DataError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = ticker.tick() => {}
            }
            if stop.is_stopped() {
                break;
            }
            self.poll_once(handler).await;
        }
        Ok(())
    }
}
