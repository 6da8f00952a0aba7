//! Pipeline lifecycle.
//!
//! A [`MarketDataSource`] runs its acquisition loop on a dedicated tokio
//! task and hands each observation to an [`ObservationHandler`], awaiting
//! the handler before acquiring the next one.

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use trading_core::error::DataError;
use trading_core::traits::ObservationHandler;
use trading_core::types::Observation;

/// An acquisition loop producing observations.
#[async_trait]
pub trait MarketDataSource: Send {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Run until `stop` fires.
    ///
    /// Feed errors are handled inside the loop; an `Err` means the source
    /// cannot run at all.
    async fn run(
        &mut self,
        handler: &mut dyn ObservationHandler,
        stop: &mut StopSignal,
    ) -> Result<(), DataError>;
}

/// Cooperative stop flag observed by a running source.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Create a flag and the sender that raises it.
    pub fn channel() -> (watch::Sender<bool>, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (tx, StopSignal { rx })
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop is requested or the sender is gone.
    ///
    /// Cancel safe, so it can sit in a `select!` next to the feed.
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Everything a finished pipeline hands back.
pub struct Finished<S, H> {
    pub source: S,
    pub handler: H,
    pub result: Result<(), DataError>,
}

/// Handle to a running pipeline.
///
/// Dropping the handle also stops the pipeline.
pub struct PipelineHandle<S, H> {
    stop: watch::Sender<bool>,
    task: JoinHandle<Finished<S, H>>,
}

impl<S, H> PipelineHandle<S, H> {
    /// Ask the loop to exit at its next iteration boundary.
    ///
    /// An in-flight fetch or handler call completes first.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit and take back the source and handler.
    ///
    /// Passing them to [`start`] again restarts the pipeline.
    pub async fn join(self) -> Result<Finished<S, H>, DataError> {
        self.task
            .await
            .map_err(|e| DataError::Internal(format!("pipeline task failed: {e}")))
    }
}

/// Start `source` on its own task, feeding `handler`.
pub fn start<S, H>(mut source: S, mut handler: H) -> PipelineHandle<S, H>
where
    S: MarketDataSource + 'static,
    H: ObservationHandler + 'static,
{
    let (stop_tx, mut stop) = StopSignal::channel();
    let task = tokio::spawn(async move {
        info!(source = source.name(), "Pipeline started");
        let result = source.run(&mut handler, &mut stop).await;
        match &result {
            Ok(()) => info!(source = source.name(), "Pipeline stopped"),
            Err(e) => error!(source = source.name(), error = %e, "Pipeline failed"),
        }
        Finished {
            source,
            handler,
            result,
        }
    });

    PipelineHandle {
        stop: stop_tx,
        task,
    }
}

/// Hand one observation to the handler, logging rather than propagating
/// its failure so one bad call does not end the loop.
pub(crate) async fn deliver(handler: &mut dyn ObservationHandler, observation: Observation) {
    let market = observation.market.clone();
    if let Err(e) = handler.on_observation(observation).await {
        error!(%market, error = %e, "Observation handler failed");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use trading_core::TradingError;

    /// Handler that records observations and can be told to fail.
    #[derive(Default)]
    pub struct Recorder {
        pub seen: Vec<Observation>,
        pub fail: bool,
    }

    #[async_trait]
    impl ObservationHandler for Recorder {
        async fn on_observation(&mut self, observation: Observation) -> Result<(), TradingError> {
            self.seen.push(observation);
            if self.fail {
                return Err(TradingError::Internal("handler failure".into()));
            }
            Ok(())
        }
    }
}
