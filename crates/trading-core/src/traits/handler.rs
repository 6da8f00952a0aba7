//! Pipeline callback trait.

use crate::error::TradingError;
use crate::types::Observation;
use async_trait::async_trait;

/// Receiver of pipeline observations.
///
/// A pipeline awaits each call before acquiring the next observation, so a
/// slow handler delays the feed instead of racing ahead of it.
#[async_trait]
pub trait ObservationHandler: Send {
    async fn on_observation(&mut self, observation: Observation) -> Result<(), TradingError>;
}
