//! Persistent-connection streaming source.
//!
//! Keeps one session open, pings it every keepalive period and replaces it
//! every reset period regardless of traffic, since a silently dead
//! connection looks exactly like a quiet market. A server-reported protocol
//! error closes the session, and it stays closed until the next reset
//! deadline so a misbehaving server is not hammered with reconnects.

mod decoder;
mod ws;

pub use decoder::{Frame, FrameDecoder, TickerArrayDecoder};
pub use ws::WsConnector;

use crate::latency::LatencyOffset;
use crate::pipeline::{deliver, MarketDataSource, StopSignal};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use trading_core::error::DataError;
use trading_core::traits::ObservationHandler;
use trading_core::types::{FeedQuote, Observation};
use trading_core::{Clock, SystemClock};

/// An open streaming connection.
#[async_trait]
pub trait StreamSession: Send {
    /// Next text frame. `None` once the server has closed the stream.
    ///
    /// Must be cancel safe.
    async fn recv(&mut self) -> Option<Result<String, DataError>>;

    async fn ping(&mut self) -> Result<(), DataError>;

    async fn close(&mut self);
}

/// Opens [`StreamSession`]s.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StreamSession>, DataError>;

    /// Where this connector connects, for logging.
    fn endpoint(&self) -> &str;
}

/// Streaming timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingSettings {
    /// Ping period, also the wait after a failed connect
    pub keepalive: Duration,
    /// Proactive reconnect period
    pub reset_interval: Duration,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(30),
            reset_interval: Duration::from_secs(15 * 60),
        }
    }
}

enum Wake {
    Stop,
    Reset,
    Ping,
    Frame(Option<Result<String, DataError>>),
}

/// Streaming source for one market.
pub struct StreamingSource {
    market: String,
    connector: Box<dyn StreamConnector>,
    decoder: Box<dyn FrameDecoder>,
    settings: StreamingSettings,
    clock: Arc<dyn Clock>,
    latency: LatencyOffset,
}

impl StreamingSource {
    pub fn new(
        market: impl Into<String>,
        connector: Box<dyn StreamConnector>,
        decoder: Box<dyn FrameDecoder>,
    ) -> Self {
        Self {
            market: market.into(),
            connector,
            decoder,
            settings: StreamingSettings::default(),
            clock: Arc::new(SystemClock),
            latency: LatencyOffset::zero(),
        }
    }

    pub fn with_settings(mut self, settings: StreamingSettings) -> Self {
        self.settings = settings;
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

    fn observe(&self, quote: FeedQuote) -> Observation {
        let timestamp = quote
            .timestamp
            .unwrap_or_else(|| self.latency.apply(self.clock.now()));
        Observation::new(&self.market, quote.quote, timestamp)
    }
}

/// Receive from the session, or never resolve while there is none.
async fn recv_or_idle(
    session: &mut Option<Box<dyn StreamSession>>,
) -> Option<Result<String, DataError>> {
    match session {
        Some(session) => session.recv().await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl MarketDataSource for StreamingSource {
    fn name(&self) -> &str {
        self.connector.endpoint()
    }

    async fn run(
        &mut self,
        handler: &mut dyn ObservationHandler,
        stop: &mut StopSignal,
    ) -> Result<(), DataError> {
        let keepalive = self.settings.keepalive;
        let mut session: Option<Box<dyn StreamSession>> = None;
        // Connect right away
        let mut reset_at = Instant::now();
        let mut ping = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wake = tokio::select! {
                biased;
                _ = stop.stopped() => Wake::Stop,
                _ = sleep_until(reset_at) => Wake::Reset,
                _ = ping.tick() => Wake::Ping,
                frame = recv_or_idle(&mut session) => Wake::Frame(frame),
            };

            match wake {
                Wake::Stop => break,
                Wake::Reset => {
                    if let Some(mut old) = session.take() {
                        info!(market = %self.market, "Periodic stream reset");
                        old.close().await;
                    }
                    match self.connector.connect().await {
                        Ok(new) => {
                            info!(market = %self.market, endpoint = self.connector.endpoint(), "Stream connected");
                            session = Some(new);
                            reset_at = Instant::now() + self.settings.reset_interval;
                            ping.reset();
                        }
                        Err(e) => {
                            warn!(market = %self.market, error = %e, "Stream connect failed, retrying after keepalive period");
                            reset_at = Instant::now() + keepalive;
                        }
                    }
                }
                Wake::Ping => {
                    if let Some(open) = session.as_mut() {
                        if let Err(e) = open.ping().await {
                            warn!(market = %self.market, error = %e, "Keepalive ping failed");
                        }
                    }
                }
                Wake::Frame(None) => {
                    warn!(market = %self.market, "Stream closed by server, waiting for the next reset");
                    session = None;
                }
                Wake::Frame(Some(Err(e))) => {
                    warn!(market = %self.market, error = %e, "Stream receive failed");
                }
                Wake::Frame(Some(Ok(text))) => match self.decoder.decode(&text) {
                    Frame::Quote(quote) => deliver(handler, self.observe(quote)).await,
                    Frame::ProtocolError(message) => {
                        let e = DataError::Protocol(message);
                        error!(market = %self.market, error = %e, "Server reported an error, closing stream");
                        if let Some(mut open) = session.take() {
                            open.close().await;
                        }
                    }
                    Frame::Ignored => trace!(market = %self.market, %text, "Ignoring frame"),
                },
            }
        }

        if let Some(mut open) = session.take() {
            debug!(market = %self.market, "Closing stream on stop");
            open.close().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::start;
    use crate::pipeline::testing::Recorder;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use trading_core::types::Quote;

    const TICK: &str = "[2,1,1,1,1,0,0,100.5,10,101,99]";

    enum Scripted {
        Text(&'static str),
        /// A transport error on receive
        Fail,
        Close,
    }

    #[derive(Default)]
    struct Counters {
        connects: AtomicUsize,
        pings: AtomicUsize,
        closes: AtomicUsize,
    }

    /// Hands out scripted sessions; once the scripts run out, sessions
    /// stay open and silent.
    struct MockConnector {
        scripts: Mutex<VecDeque<Vec<Scripted>>>,
        counters: Arc<Counters>,
        fail_first: bool,
    }

    impl MockConnector {
        fn new(scripts: Vec<Vec<Scripted>>) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            let connector = Self {
                scripts: Mutex::new(scripts.into()),
                counters: counters.clone(),
                fail_first: false,
            };
            (connector, counters)
        }
    }

    struct MockSession {
        frames: VecDeque<Scripted>,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl StreamConnector for MockConnector {
        async fn connect(&self) -> Result<Box<dyn StreamSession>, DataError> {
            let attempt = self.counters.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && attempt == 0 {
                return Err(DataError::ConnectionError("refused".into()));
            }
            let frames = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default()
                .into();
            Ok(Box::new(MockSession {
                frames,
                counters: self.counters.clone(),
            }))
        }

        fn endpoint(&self) -> &str {
            "mock://stream"
        }
    }

    #[async_trait]
    impl StreamSession for MockSession {
        async fn recv(&mut self) -> Option<Result<String, DataError>> {
            match self.frames.pop_front() {
                Some(Scripted::Text(text)) => Some(Ok(text.to_string())),
                Some(Scripted::Fail) => Some(Err(DataError::ConnectionError("reset by peer".into()))),
                Some(Scripted::Close) => None,
                None => std::future::pending().await,
            }
        }

        async fn ping(&mut self) -> Result<(), DataError> {
            self.counters.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn source(connector: MockConnector) -> StreamingSource {
        StreamingSource::new(
            "BTC_USD",
            Box::new(connector),
            Box::new(TickerArrayDecoder::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_become_observations() {
        let (connector, counters) = MockConnector::new(vec![vec![
            Scripted::Text(r#"{"event":"subscribed","chanId":2}"#),
            Scripted::Text(TICK),
            Scripted::Text(r#"[2,"hb"]"#),
            Scripted::Text(TICK),
        ]]);
        let handle = start(source(connector), Recorder::default());

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop();
        let finished = handle.join().await.unwrap();

        assert_eq!(finished.handler.seen.len(), 2);
        assert_eq!(finished.handler.seen[0].market, "BTC_USD");
        assert_eq!(finished.handler.seen[0].quote, Quote::Last { price: dec!(100.5) });
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        // Closed on stop
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_pings() {
        let (connector, counters) = MockConnector::new(vec![]);
        let handle = start(source(connector), Recorder::default());

        tokio::time::sleep(Duration::from_secs(95)).await;
        handle.stop();
        handle.join().await.unwrap();

        assert_eq!(counters.pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_reset_reconnects() {
        let (connector, counters) = MockConnector::new(vec![]);
        let handle = start(source(connector), Recorder::default());

        tokio::time::sleep(Duration::from_secs(31 * 60)).await;
        handle.stop();
        handle.join().await.unwrap();

        // At 0, 15 and 30 minutes
        assert_eq!(counters.connects.load(Ordering::SeqCst), 3);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_error_waits_for_reset() {
        let (connector, counters) = MockConnector::new(vec![
            vec![
                Scripted::Text(r#"{"event":"error","msg":"bad channel"}"#),
                Scripted::Text(TICK),
            ],
            vec![Scripted::Text(TICK)],
        ]);
        let handle = start(source(connector), Recorder::default());

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        // No pings go to a closed session
        assert_eq!(counters.pings.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(6 * 60)).await;
        handle.stop();
        let finished = handle.join().await.unwrap();

        assert_eq!(counters.connects.load(Ordering::SeqCst), 2);
        // The frame after the error was never read
        assert_eq!(finished.handler.seen.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_error_keeps_the_session() {
        let (connector, counters) = MockConnector::new(vec![vec![
            Scripted::Text(TICK),
            Scripted::Fail,
            Scripted::Fail,
            Scripted::Text(TICK),
        ]]);
        let handle = start(source(connector), Recorder::default());

        tokio::time::sleep(Duration::from_secs(40)).await;
        // Still open: nothing closed it and the keepalive reaches it
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
        assert_eq!(counters.pings.load(Ordering::SeqCst), 1);

        handle.stop();
        let finished = handle.join().await.unwrap();

        assert_eq!(finished.handler.seen.len(), 2);
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_waits_for_reset() {
        let (connector, counters) = MockConnector::new(vec![vec![Scripted::Close]]);
        let handle = start(source(connector), Recorder::default());

        tokio::time::sleep(Duration::from_secs(60)).await;
        handle.stop();
        handle.join().await.unwrap();

        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(counters.pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_retries_after_keepalive() {
        let (mut connector, counters) = MockConnector::new(vec![vec![Scripted::Text(TICK)]]);
        connector.fail_first = true;
        let handle = start(source(connector), Recorder::default());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.stop();
        let finished = handle.join().await.unwrap();

        assert_eq!(counters.connects.load(Ordering::SeqCst), 2);
        assert_eq!(finished.handler.seen.len(), 1);
    }
}
