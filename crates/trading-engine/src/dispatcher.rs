//! Strategy to observer fan-out.

use crate::observer::Observer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use trading_broker::TraderSummary;
use trading_core::traits::ObservationHandler;
use trading_core::{Decision, Observation, Strategy, TradingError, TradingResult};

/// Runs one strategy and notifies every attached observer of its decisions.
pub struct SignalDispatcher {
    strategy: Box<dyn Strategy>,
    observers: Vec<Observer>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl SignalDispatcher {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self {
            strategy,
            observers: Vec::new(),
            last_timestamp: None,
        }
    }

    pub fn attach_observer(&mut self, observer: Observer) {
        info!(
            strategy = self.strategy.name(),
            kind = observer.kind(),
            market = observer.trader().market(),
            "Observer attached"
        );
        self.observers.push(observer);
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn observers(&self) -> &[Observer] {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut [Observer] {
        &mut self.observers
    }

    pub fn summaries(&self) -> Vec<TraderSummary> {
        self.observers.iter().map(|o| o.trader().summary()).collect()
    }

    /// Feed one observation through the strategy.
    ///
    /// Observations must arrive in time order. Every observer is notified
    /// even if an earlier one fails; the first failure is returned.
    ///
    /// # Returns
    /// The decision the observers acted on, if any
    pub async fn adjust(&mut self, observation: &Observation) -> TradingResult<Option<Decision>> {
        if let Some(last) = self.last_timestamp {
            if observation.timestamp < last {
                return Err(TradingError::Validation(format!(
                    "Observation for {} at {} is older than the previous one at {}",
                    observation.market, observation.timestamp, last
                )));
            }
        }
        self.last_timestamp = Some(observation.timestamp);

        let Some(decision) = self.strategy.on_observation(observation) else {
            return Ok(None);
        };
        debug!(
            strategy = self.strategy.name(),
            action = %decision.action,
            price = %decision.price,
            "Dispatching decision"
        );

        let mut first_error = None;
        for (index, observer) in self.observers.iter_mut().enumerate() {
            if let Err(e) = observer.notify(&decision).await {
                error!(
                    observer = index,
                    market = observer.trader().market(),
                    error = %e,
                    "Observer failed to act on decision"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(Some(decision)),
        }
    }
}

#[async_trait]
impl ObservationHandler for SignalDispatcher {
    async fn on_observation(&mut self, observation: Observation) -> Result<(), TradingError> {
        self.adjust(&observation).await.map(|_| ())
    }
}
