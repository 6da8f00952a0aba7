//! Market data pipelines.
//!
//! A pipeline pairs a [`MarketDataSource`] with an
//! [`ObservationHandler`](trading_core::traits::ObservationHandler) and runs
//! it on its own task. Two sources are provided: [`PollingSource`] fetches a
//! snapshot on a fixed interval, [`StreamingSource`] keeps a persistent
//! connection open.

pub mod latency;
pub mod pipeline;
pub mod polling;
pub mod streaming;

pub use latency::{probe_latency, LatencyOffset};
pub use pipeline::{start, Finished, MarketDataSource, PipelineHandle, StopSignal};
pub use polling::{PollTarget, PollingSource, DEFAULT_POLL_INTERVAL};
pub use streaming::{
    Frame, FrameDecoder, StreamConnector, StreamSession, StreamingSettings, StreamingSource,
    TickerArrayDecoder, WsConnector,
};
