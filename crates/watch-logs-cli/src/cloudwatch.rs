// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! CloudWatch Logs fallback for functions without a real-time endpoint.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatchlogs::error::{DisplayErrorContext, SdkError};
use aws_sdk_cloudwatchlogs::types::OrderBy;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use watch_logs_core::record::now_millis;
use watch_logs_core::{parse, ParsedLogEvent};

use crate::error::PollError;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const STREAM_LIMIT: i32 = 10;
pub const EVENT_LIMIT: i32 = 50;
pub const LOG_GROUP_NOT_FOUND_WARNING: &str =
    "Lambda Log Group not found, this could mean it has not yet been invoked.";
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[must_use]
pub fn log_group_name(function_name: &str) -> String {
    format!("/aws/lambda/{function_name}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredEvent {
    pub timestamp: i64,
    pub message: String,
}

/// Read access to a function's log group.
#[async_trait]
pub trait LogEventSource: Send + Sync {
    /// Names of the most recently written streams, newest first.
    async fn recent_streams(&self, log_group: &str, limit: i32) -> Result<Vec<String>, PollError>;

    /// Events of `streams` at or after `start_time` (epoch millis), oldest first.
    async fn filter_events(
        &self,
        log_group: &str,
        streams: &[String],
        start_time: i64,
        limit: i32,
    ) -> Result<Vec<FilteredEvent>, PollError>;
}

pub struct CloudWatchLogsSource {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl CloudWatchLogsSource {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudwatchlogs::Client::new(config),
        }
    }
}

fn poll_error<E, R>(err: SdkError<E, R>, log_group: &str, not_found: fn(&E) -> bool) -> PollError
where
    E: std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    if err.as_service_error().is_some_and(not_found) {
        return PollError::LogGroupNotFound(log_group.to_string());
    }
    PollError::Sdk(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl LogEventSource for CloudWatchLogsSource {
    async fn recent_streams(&self, log_group: &str, limit: i32) -> Result<Vec<String>, PollError> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(log_group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(limit)
            .send()
            .await
            .map_err(|err| poll_error(err, log_group, |e| e.is_resource_not_found_exception()))?;

        Ok(output
            .log_streams()
            .iter()
            .filter_map(|stream| stream.log_stream_name())
            .map(str::to_string)
            .collect())
    }

    async fn filter_events(
        &self,
        log_group: &str,
        streams: &[String],
        start_time: i64,
        limit: i32,
    ) -> Result<Vec<FilteredEvent>, PollError> {
        if streams.is_empty() {
            return Ok(Vec::new());
        }
        // the service always interleaves events across streams, the old interleaved flag is ignored
        let output = self
            .client
            .filter_log_events()
            .log_group_name(log_group)
            .set_log_stream_names(Some(streams.to_vec()))
            .start_time(start_time)
            .limit(limit)
            .send()
            .await
            .map_err(|err| poll_error(err, log_group, |e| e.is_resource_not_found_exception()))?;

        Ok(output
            .events()
            .iter()
            .map(|event| FilteredEvent {
                timestamp: event.timestamp().unwrap_or_else(now_millis),
                message: event.message().unwrap_or_default().to_string(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Log(ParsedLogEvent),
    Warning(String),
}

/// Polls one log group with a strict cursor: every poll asks only for events
/// newer than the last one seen.
pub struct CloudWatchPoller {
    source: Arc<dyn LogEventSource>,
    log_group: String,
    start_time: i64,
    warned_missing_group: bool,
}

impl CloudWatchPoller {
    #[must_use]
    pub fn new(source: Arc<dyn LogEventSource>, function_name: &str) -> Self {
        Self::starting_at(source, function_name, now_millis())
    }

    #[must_use]
    pub fn starting_at(source: Arc<dyn LogEventSource>, function_name: &str, start_time: i64) -> Self {
        Self {
            source,
            log_group: log_group_name(function_name),
            start_time,
            warned_missing_group: false,
        }
    }

    #[must_use]
    pub fn cursor(&self) -> i64 {
        self.start_time
    }

    #[must_use]
    pub fn log_group(&self) -> &str {
        &self.log_group
    }

    /// Fetches the next page and moves the cursor past it.
    pub async fn poll_once(&mut self) -> Result<Vec<ParsedLogEvent>, PollError> {
        let streams = self.source.recent_streams(&self.log_group, STREAM_LIMIT).await?;
        let events = self
            .source
            .filter_events(&self.log_group, &streams, self.start_time, EVENT_LIMIT)
            .await?;

        let mut parsed = Vec::with_capacity(events.len());
        for event in events {
            self.start_time = self.start_time.max(event.timestamp.saturating_add(1));
            if event.message.is_empty() {
                continue;
            }
            let timestamp = DateTime::from_timestamp_millis(event.timestamp).unwrap_or_else(Utc::now);
            parsed.push(parse(&event.message, timestamp));
        }
        Ok(parsed)
    }

    /// One poll turned into display events. Only the first missing log group
    /// is reported; every other failure waits for the next tick.
    pub async fn tick(&mut self) -> Vec<PollEvent> {
        match self.poll_once().await {
            Ok(events) => events.into_iter().map(PollEvent::Log).collect(),
            Err(PollError::LogGroupNotFound(group)) => {
                if self.warned_missing_group {
                    debug!("Log group {group} still missing");
                    Vec::new()
                } else {
                    self.warned_missing_group = true;
                    vec![PollEvent::Warning(LOG_GROUP_NOT_FOUND_WARNING.to_string())]
                }
            }
            Err(err) => {
                debug!("CloudWatch poll of {} failed: {err}", self.log_group);
                Vec::new()
            }
        }
    }

    /// Polls every second, starting immediately, until cancelled or the
    /// receiver is dropped.
    pub fn spawn(mut self, cancel_token: CancellationToken) -> mpsc::Receiver<PollEvent> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancel_token.cancelled() => break,
                    () = events_tx.closed() => break,
                    _ = ticker.tick() => {}
                }
                for event in self.tick().await {
                    if events_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            debug!("Stopped polling {}", self.log_group);
        });
        events_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_group_name() {
        assert_eq!(log_group_name("my-stack-Handler-AbC"), "/aws/lambda/my-stack-Handler-AbC");
    }
}
