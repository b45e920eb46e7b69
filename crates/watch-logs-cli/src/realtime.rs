// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Real-time log stream from the bridge websocket.
//!
//! The client keeps one connection per endpoint open for the whole watch
//! session. Every text frame pushed by the bridge is a JSON array of log
//! records; each record is handed to the caller as a [`LogStreamEvent::Log`].
//! Unexpected closures are retried with exponential backoff and only show up
//! as `Disconnect`/`Connect` pairs. Every reconnect waits out the backoff
//! delay. A connection that closes before the server sent anything and
//! before [`RealTimeConfig::stable_after`] elapsed counts as a failed attempt,
//! so the delay only starts over after a healthy session. Only a rejected
//! handshake or too many consecutive failed attempts end the stream with
//! [`LogStreamEvent::Error`].

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;
use watch_logs_core::{LogLevel, LogRecord};

use crate::backoff::{BackoffConfig, BackoffState};
use crate::error::RealTimeError;
use crate::signing::RequestSigner;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(60);
pub const MAX_CONNECT_ATTEMPTS: u32 = 10;
pub const STABLE_AFTER: Duration = Duration::from_secs(10);
pub const PING: &str = "ping";
pub const PONG: &str = "pong";
const EVENT_CHANNEL_CAPACITY: usize = 1024;

type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, PartialEq)]
pub enum LogStreamEvent {
    Connect,
    Disconnect,
    Log(LogRecord),
    Error(RealTimeError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealTimeConfig {
    pub keep_alive: Duration,
    pub max_connect_attempts: u32,
    /// Uptime after which a silent connection still counts as healthy
    pub stable_after: Duration,
    pub backoff: BackoffConfig,
}

impl Default for RealTimeConfig {
    fn default() -> Self {
        Self {
            keep_alive: KEEP_ALIVE_INTERVAL,
            max_connect_attempts: MAX_CONNECT_ATTEMPTS,
            stable_after: STABLE_AFTER,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Builds `<endpoint>?lambdas=<a>,<b>`, upgrading http(s) schemes to ws(s).
pub fn connection_url(endpoint: &str, function_names: &[String]) -> Result<Url, RealTimeError> {
    let invalid = |message: String| RealTimeError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };
    let mut url = Url::parse(endpoint).map_err(|err| invalid(err.to_string()))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot use scheme {scheme}")))?;
    url.set_query(Some(&format!("lambdas={}", function_names.join(","))));
    Ok(url)
}

/// Decodes one pushed frame. Anything that is not a record array is kept as
/// a single raw line so nothing is lost.
#[must_use]
pub fn decode_batch(text: &str) -> Vec<LogRecord> {
    match serde_json::from_str::<Vec<LogRecord>>(text) {
        Ok(records) => records,
        Err(err) => {
            debug!("Received a frame that is not a log batch: {err}");
            vec![LogRecord::new(LogLevel::Info, vec![Value::String(text.to_string())])]
        }
    }
}

enum Session {
    /// The server or the network ended the connection. `healthy` is set once
    /// the server sent a frame or the connection outlived `stable_after`.
    Closed { healthy: bool },
    /// Cancelled, or nobody is listening any more.
    Stopped,
}

pub struct RealTimeLogClient {
    url: Url,
    signer: Option<Arc<dyn RequestSigner>>,
    config: RealTimeConfig,
}

impl RealTimeLogClient {
    #[must_use]
    pub fn new(url: Url, signer: Option<Arc<dyn RequestSigner>>, config: RealTimeConfig) -> Self {
        Self {
            url,
            signer,
            config,
        }
    }

    /// Starts the connection task. The stream ends after an `Error` event,
    /// on cancellation, or once the receiver is dropped.
    pub fn spawn(self, cancel_token: CancellationToken) -> mpsc::Receiver<LogStreamEvent> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move { self.run(events_tx, cancel_token).await });
        events_rx
    }

    async fn run(self, events: mpsc::Sender<LogStreamEvent>, cancel_token: CancellationToken) {
        let mut backoff = BackoffState::new(self.config.backoff);
        loop {
            let attempt = tokio::select! {
                biased;
                () = cancel_token.cancelled() => return,
                attempt = self.connect() => attempt,
            };

            let last_error = match attempt {
                Ok(connection) => {
                    if events.send(LogStreamEvent::Connect).await.is_err() {
                        return;
                    }
                    match self.pump(connection, &events, &cancel_token).await {
                        Session::Stopped => return,
                        Session::Closed { healthy } => {
                            if events.send(LogStreamEvent::Disconnect).await.is_err() {
                                return;
                            }
                            if healthy {
                                backoff.register_success();
                                "connection closed".to_string()
                            } else {
                                "connection closed right after opening".to_string()
                            }
                        }
                    }
                }
                Err(err) if err.is_fatal() => {
                    let _ = events.send(LogStreamEvent::Error(err)).await;
                    return;
                }
                Err(err) => err.to_string(),
            };

            let delay = backoff.register_error();
            let attempts = backoff.error_count();
            if attempts >= self.config.max_connect_attempts {
                let _ = events
                    .send(LogStreamEvent::Error(RealTimeError::GaveUp {
                        attempts,
                        last_error,
                    }))
                    .await;
                return;
            }
            warn!("Real-time logs unavailable, reconnecting in {delay:?}: {last_error}");
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn connect(&self) -> Result<Connection, RealTimeError> {
        let mut request = self.url.as_str().into_client_request().map_err(|err| {
            RealTimeError::InvalidEndpoint {
                endpoint: self.url.to_string(),
                message: err.to_string(),
            }
        })?;
        if let Some(signer) = &self.signer {
            signer.sign(&mut request).await?;
        }

        match connect_async(request).await {
            Ok((connection, response)) => {
                debug!(
                    status = response.status().as_u16(),
                    "Connected to real-time logs endpoint {}",
                    self.url.host_str().unwrap_or_default()
                );
                Ok(connection)
            }
            Err(WsError::Http(response)) if response.status().is_client_error() => {
                Err(RealTimeError::Handshake {
                    status: response.status().as_u16(),
                })
            }
            Err(err) => Err(RealTimeError::Connect(err.to_string())),
        }
    }

    async fn pump(
        &self,
        connection: Connection,
        events: &mpsc::Sender<LogStreamEvent>,
        cancel_token: &CancellationToken,
    ) -> Session {
        let (mut sink, mut source) = connection.split();
        let opened = Instant::now();
        let mut heard_from_server = false;
        let closed = |heard: bool| Session::Closed {
            healthy: heard || opened.elapsed() >= self.config.stable_after,
        };
        // first tick completes at once, so the server sees a ping right after open
        let mut keep_alive = tokio::time::interval(self.config.keep_alive);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Session::Stopped;
                }
                () = events.closed() => return Session::Stopped,
                _ = keep_alive.tick() => {
                    if let Err(err) = sink.send(WsMessage::text(PING.to_string())).await {
                        debug!("Failed to send keep-alive: {err}");
                        return closed(heard_from_server);
                    }
                }
                message = source.next() => {
                    let text = match message {
                        Some(Ok(WsMessage::Text(text))) => text.as_str().to_string(),
                        Some(Ok(WsMessage::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                        // tungstenite queues the pong for a ping frame on its own
                        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                            heard_from_server = true;
                            continue;
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            debug!("Real-time logs connection closed by server: {frame:?}");
                            return closed(heard_from_server);
                        }
                        Some(Err(err)) => {
                            warn!("Real-time logs connection error: {err}");
                            return closed(heard_from_server);
                        }
                        None => return closed(heard_from_server),
                    };
                    heard_from_server = true;

                    if text == PONG {
                        continue;
                    }
                    for record in decode_batch(&text) {
                        if events.send(LogStreamEvent::Log(record)).await.is_err() {
                            return Session::Stopped;
                        }
                    }
                }
            }
        }
    }
}
