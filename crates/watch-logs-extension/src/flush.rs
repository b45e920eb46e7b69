// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error};
use watch_logs_bridge::Fanout;
use watch_logs_core::LogRecord;

use crate::error::ExtensionError;
use crate::queue::LogQueue;

/// Destination of drained batches
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, batch: Vec<LogRecord>) -> Result<(), ExtensionError>;
}

/// Publishes through the bridge fan-out, stamping the emitting function on
/// records that do not carry it yet.
#[derive(Clone)]
pub struct FanoutPublisher {
    fanout: Fanout,
    function_name: String,
}

impl FanoutPublisher {
    #[must_use]
    pub fn new(fanout: Fanout, function_name: String) -> Self {
        Self {
            fanout,
            function_name,
        }
    }
}

#[async_trait]
impl Publisher for FanoutPublisher {
    async fn publish(&self, batch: Vec<LogRecord>) -> Result<(), ExtensionError> {
        let batch: Vec<LogRecord> = batch
            .into_iter()
            .map(|record| match record.function_identity {
                Some(_) => record,
                None => record.with_function_identity(self.function_name.as_str()),
            })
            .collect();
        let report = self.fanout.push(&batch).await?;
        debug!(
            "Log batch delivered to {} connections ({} gone, {} failed)",
            report.delivered, report.gone, report.failed
        );
        Ok(())
    }
}

/// Drains the queue once and publishes the batch.
///
/// An empty queue publishes nothing. A publish failure is logged and the
/// batch is dropped. Returns the number of drained records.
pub async fn flush(queue: &LogQueue, publisher: &dyn Publisher) -> usize {
    let batch = queue.drain();
    if batch.is_empty() {
        return 0;
    }
    let count = batch.len();
    if let Err(e) = publisher.publish(batch).await {
        error!("Dropping {count} log records: {e}");
    }
    count
}

/// Waits `delay` for late platform deliveries, then flushes until the queue
/// stays empty.
pub async fn settle_and_drain(queue: &LogQueue, publisher: &dyn Publisher, delay: Duration) -> usize {
    tokio::time::sleep(delay).await;
    let mut drained = 0;
    loop {
        let count = flush(queue, publisher).await;
        if count == 0 {
            break;
        }
        drained += count;
    }
    drained
}
