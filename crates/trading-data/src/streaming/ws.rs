//! WebSocket transport.

use super::{StreamConnector, StreamSession};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use trading_core::error::DataError;

/// Connects to a WebSocket endpoint and optionally subscribes.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    subscribe: Option<String>,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subscribe: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Text frame sent right after connecting.
    pub fn with_subscription(mut self, payload: impl Into<String>) -> Self {
        self.subscribe = Some(payload.into());
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn StreamSession>, DataError> {
        let (mut stream, _response) = timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| DataError::ConnectionError(format!("timed out connecting to {}", self.url)))?
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!(url = %self.url, "WebSocket connected");

        if let Some(payload) = &self.subscribe {
            stream
                .send(Message::Text(payload.clone()))
                .await
                .map_err(|e| DataError::ConnectionError(e.to_string()))?;
            debug!(url = %self.url, "Subscription sent");
        }

        Ok(Box::new(WsSession { stream }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamSession for WsSession {
    async fn recv(&mut self) -> Option<Result<String, DataError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    return None;
                }
                // Pongs to server pings are queued by tungstenite itself
                Ok(_) => continue,
                Err(WsError::Protocol(e)) => return Some(Err(DataError::Protocol(e.to_string()))),
                Err(e) => return Some(Err(DataError::ConnectionError(e.to_string()))),
            }
        }
    }

    async fn ping(&mut self) -> Result<(), DataError> {
        self.stream
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "WebSocket close failed");
        }
    }
}
