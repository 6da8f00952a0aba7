//! Clock skew estimation.
//!
//! Observations from feeds without exchange timestamps are stamped locally.
//! A one-off probe estimates how far the exchange clock is from ours so the
//! local stamp can be corrected.

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use trading_core::error::DataError;
use trading_core::traits::MarketFeed;
use trading_core::Clock;

/// Correction added to locally stamped observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyOffset(Duration);

impl LatencyOffset {
    pub fn zero() -> Self {
        Self(Duration::zero())
    }

    pub fn from_duration(offset: Duration) -> Self {
        Self(offset)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn apply(&self, local: DateTime<Utc>) -> DateTime<Utc> {
        local + self.0
    }
}

impl Default for LatencyOffset {
    fn default() -> Self {
        Self::zero()
    }
}

/// Estimate the offset from `samples` server time round trips.
///
/// The first call warms up the connection and is discarded. The average of
/// `server - client` is halved, treating half of it as transit time.
pub async fn probe_latency(
    feed: &dyn MarketFeed,
    clock: &dyn Clock,
    samples: usize,
) -> Result<LatencyOffset, DataError> {
    if samples == 0 {
        return Ok(LatencyOffset::zero());
    }

    feed.server_time().await?;

    let mut total = Duration::zero();
    for _ in 0..samples {
        let server = feed.server_time().await?;
        total += server - clock.now();
    }

    let count = i32::try_from(samples).unwrap_or(i32::MAX);
    let offset = LatencyOffset(total / count / 2);
    info!(
        feed = feed.name(),
        samples,
        offset_ms = offset.0.num_milliseconds(),
        "Estimated feed latency"
    );
    Ok(offset)
}
