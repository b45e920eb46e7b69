// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle loop of the extension process.
//!
//! ```text
//!   Unregistered ──register──> Registered ──> AwaitingEvent <──> ProcessingEvent
//!                                                   │
//!                                 SHUTDOWN / signal / next-event failure
//!                                                   v
//!                                             ShuttingDown ──> Terminated
//! ```
//!
//! Every INVOKE drains the queue after a short settle delay. Lines of the
//! invocation that the platform delivers after the next poll resolved are
//! published with the following event. SHUTDOWN and cancellation drain once
//! more before the loop returns.

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ExtensionError;
use crate::extensions_api::{ExtensionsApiClient, NextEvent};
use crate::flush::{settle_and_drain, Publisher};
use crate::logs_api::{self, SubscriptionRequest};
use crate::queue::LogQueue;

/// Cancels `cancel_token` once `signal` resolves with a received signal.
/// A handler that cannot be installed is logged and the loop keeps running.
pub async fn cancel_on_signal<F>(signal: F, cancel_token: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Received termination signal");
            cancel_token.cancel();
        }
        Err(e) => error!("Failed to listen for termination signals: {e}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Unregistered,
    Registered,
    AwaitingEvent,
    ProcessingEvent,
    ShuttingDown,
    Terminated,
}

/// Platform calls the loop depends on
#[async_trait]
pub trait ExtensionControl: Send + Sync {
    /// Returns the extension identifier
    async fn register(&self) -> Result<String, ExtensionError>;
    async fn subscribe_logs(&self, extension_id: &str) -> Result<(), ExtensionError>;
    async fn next_event(&self, extension_id: &str) -> Result<NextEvent, ExtensionError>;
}

/// [`ExtensionControl`] over the extensions and logs APIs of the runtime
pub struct RuntimeApi {
    client: reqwest::Client,
    extensions: ExtensionsApiClient,
    logs_api_url: String,
    /// `None` when no local receiver is running
    subscription: Option<SubscriptionRequest>,
}

impl RuntimeApi {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        extensions: ExtensionsApiClient,
        logs_api_url: String,
        subscription: Option<SubscriptionRequest>,
    ) -> Self {
        Self {
            client,
            extensions,
            logs_api_url,
            subscription,
        }
    }
}

#[async_trait]
impl ExtensionControl for RuntimeApi {
    async fn register(&self) -> Result<String, ExtensionError> {
        self.extensions.register().await
    }

    async fn subscribe_logs(&self, extension_id: &str) -> Result<(), ExtensionError> {
        let Some(subscription) = &self.subscription else {
            debug!("No platform log receiver, skipping the logs subscription");
            return Ok(());
        };
        logs_api::subscribe(&self.client, &self.logs_api_url, extension_id, subscription).await
    }

    async fn next_event(&self, extension_id: &str) -> Result<NextEvent, ExtensionError> {
        self.extensions.next_event(extension_id).await
    }
}

pub struct ExtensionRuntime {
    state: RuntimeState,
    queue: LogQueue,
    publisher: Arc<dyn Publisher>,
    flush_delay: Duration,
    cancel_token: CancellationToken,
}

impl ExtensionRuntime {
    #[must_use]
    pub fn new(
        queue: LogQueue,
        publisher: Arc<dyn Publisher>,
        flush_delay: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            state: RuntimeState::Unregistered,
            queue,
            publisher,
            flush_delay,
            cancel_token,
        }
    }

    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Runs until SHUTDOWN or cancellation.
    ///
    /// A registration failure returns before anything is published. A failed
    /// subscription only loses platform lines and is logged. A failed event
    /// poll drains the queue and is returned.
    pub async fn run(&mut self, control: &dyn ExtensionControl) -> Result<(), ExtensionError> {
        let extension_id = control.register().await?;
        self.state = RuntimeState::Registered;

        if let Err(e) = control.subscribe_logs(&extension_id).await {
            warn!("Platform logs will not be forwarded: {e}");
        }

        let cancel_token = self.cancel_token.clone();
        loop {
            self.state = RuntimeState::AwaitingEvent;
            let event = tokio::select! {
                biased;
                () = cancel_token.cancelled() => None,
                event = control.next_event(&extension_id) => Some(event),
            };
            let Some(event) = event else {
                info!("Shutdown signal received");
                self.shut_down().await;
                return Ok(());
            };

            match event {
                Ok(NextEvent::Invoke { request_id, .. }) => {
                    self.state = RuntimeState::ProcessingEvent;
                    debug!(
                        "INVOKE {}",
                        request_id.as_deref().unwrap_or("without request id")
                    );
                    self.drain().await;
                }
                Ok(NextEvent::Shutdown {
                    shutdown_reason, ..
                }) => {
                    info!(
                        "SHUTDOWN ({})",
                        shutdown_reason.as_deref().unwrap_or("no reason given")
                    );
                    self.shut_down().await;
                    return Ok(());
                }
                Err(e) => {
                    error!("{e}");
                    self.shut_down().await;
                    return Err(e);
                }
            }
        }
    }

    async fn shut_down(&mut self) {
        self.state = RuntimeState::ShuttingDown;
        self.drain().await;
        self.state = RuntimeState::Terminated;
    }

    async fn drain(&self) {
        let drained = settle_and_drain(&self.queue, self.publisher.as_ref(), self.flush_delay).await;
        if drained > 0 {
            debug!("Published {drained} log records");
        }
    }
}
