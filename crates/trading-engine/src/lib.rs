//! Decision dispatch.
//!
//! A [`SignalDispatcher`] runs one strategy over the pipeline's observations
//! and hands every decision to its attached [`Observer`]s, each of which
//! drives one trader.

mod dispatcher;
mod observer;

pub use dispatcher::SignalDispatcher;
pub use observer::Observer;
