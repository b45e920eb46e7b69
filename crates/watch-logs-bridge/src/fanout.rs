// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Broadcast of a log batch to every registered connection.
//!
//! ```text
//!   batch ──> scan registry ──> post to c1 ─┐
//!                           ├─> post to c2 ─┼─> report
//!                           └─> post to c3 ─┘
//! ```
//!
//! Sends run concurrently and fail independently. A connection reported as
//! gone is removed from the registry; other failures are logged and leave the
//! row in place. Developer clients filter the batch by function identity.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, warn};
use watch_logs_core::LogRecord;

use crate::error::{BridgeError, PushError};
use crate::push::PushTarget;
use crate::registry::ConnectionRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub gone: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Fanout {
    registry: Arc<dyn ConnectionRegistry>,
    target: Arc<dyn PushTarget>,
}

impl Fanout {
    #[must_use]
    pub fn new(registry: Arc<dyn ConnectionRegistry>, target: Arc<dyn PushTarget>) -> Self {
        Self { registry, target }
    }

    /// Pushes `batch` to every connection. An empty batch issues no call at all.
    pub async fn push(&self, batch: &[LogRecord]) -> Result<FanoutReport, BridgeError> {
        if batch.is_empty() {
            return Ok(FanoutReport::default());
        }

        let data = serde_json::to_vec(batch)?;
        let connections = self.registry.scan().await.map_err(|err| {
            error!("Failed to scan for connections: {err}");
            BridgeError::from(err)
        })?;
        debug!(
            "Pushing {} log records to {} connections",
            batch.len(),
            connections.len()
        );

        let sends = connections.iter().map(|connection| {
            let data = data.as_slice();
            async move {
                let result = self.target.post(&connection.connection_id, data).await;
                self.settle(&connection.connection_id, result).await
            }
        });

        let mut report = FanoutReport::default();
        for outcome in join_all(sends).await {
            match outcome {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Gone => report.gone += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    async fn settle(&self, connection_id: &str, result: Result<(), PushError>) -> Outcome {
        match result {
            Ok(()) => Outcome::Delivered,
            Err(PushError::Gone(_)) => {
                debug!("Connection {connection_id} is gone, removing it");
                if let Err(err) = self.registry.delete(connection_id).await {
                    warn!("Failed to delete connection: {err}");
                }
                Outcome::Gone
            }
            Err(err) => {
                warn!("Failed to send log batch: {err}");
                Outcome::Failed
            }
        }
    }
}

enum Outcome {
    Delivered,
    Gone,
    Failed,
}
