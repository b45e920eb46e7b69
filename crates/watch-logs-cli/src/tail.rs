// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Tails a set of functions, each over the best available source.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use watch_logs_core::format::format;
use watch_logs_core::LogRecord;

use crate::cloudwatch::{CloudWatchPoller, LogEventSource, PollEvent};
use crate::error::RealTimeError;
use crate::realtime::{connection_url, LogStreamEvent, RealTimeConfig, RealTimeLogClient};
use crate::resolve::LambdaTarget;
use crate::signing::RequestSigner;
use crate::terminal::CliLogger;

/// Which source each target is tailed from.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TailPlan<'a> {
    /// One connection per endpoint, shared by every function behind it.
    pub real_time: BTreeMap<&'a str, Vec<&'a LambdaTarget>>,
    pub cloudwatch: Vec<&'a LambdaTarget>,
}

#[must_use]
pub fn plan(targets: &[LambdaTarget], force_cloudwatch: bool) -> TailPlan<'_> {
    let mut tail_plan = TailPlan::default();
    for target in targets {
        match target.log_endpoint.as_deref() {
            Some(endpoint) if !force_cloudwatch => {
                tail_plan.real_time.entry(endpoint).or_default().push(target);
            }
            _ => tail_plan.cloudwatch.push(target),
        }
    }
    tail_plan
}

/// Routes pushed records to the logger of their function.
pub struct Dispatcher {
    loggers: HashMap<String, CliLogger>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(loggers: impl IntoIterator<Item = (String, CliLogger)>) -> Self {
        Self {
            loggers: loggers.into_iter().collect(),
        }
    }

    /// Records of functions without a logger are printed bare rather than dropped.
    #[must_use]
    pub fn render(&self, record: &LogRecord) -> String {
        let payload = record.render_payload();
        match record
            .function_identity
            .as_deref()
            .and_then(|identity| self.loggers.get(identity))
        {
            Some(logger) => logger.line(&payload),
            None => payload,
        }
    }

    pub fn print(&self, record: &LogRecord) {
        println!("{}", self.render(record));
    }
}

/// Collaborators of a tail session.
pub struct TailSources {
    pub logs: Arc<dyn LogEventSource>,
    pub signer: Option<Arc<dyn RequestSigner>>,
    pub real_time: RealTimeConfig,
}

/// Runs until cancelled. A real-time stream that fails for good ends the
/// whole session with its error.
pub async fn tail_lambdas(
    targets: &[LambdaTarget],
    force_cloudwatch: bool,
    sources: &TailSources,
    cancel_token: CancellationToken,
) -> Result<(), RealTimeError> {
    let with_prefix = targets.len() > 1;
    let tail_plan = plan(targets, force_cloudwatch);
    let mut tasks = JoinSet::new();

    for target in &tail_plan.cloudwatch {
        debug!("Tailing {} from CloudWatch", target.path);
        let logger = CliLogger::new(&target.path, with_prefix);
        let poller = CloudWatchPoller::new(sources.logs.clone(), &target.function_name);
        let mut events = poller.spawn(cancel_token.clone());
        tasks.spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PollEvent::Log(parsed) => logger.log(&format(&parsed)),
                    PollEvent::Warning(message) => logger.error(&message),
                }
            }
            Ok(())
        });
    }

    for (endpoint, group) in &tail_plan.real_time {
        let function_names: Vec<String> =
            group.iter().map(|target| target.function_name.clone()).collect();
        let url = connection_url(endpoint, &function_names)?;
        debug!("Tailing {} functions from {endpoint}", function_names.len());

        let dispatcher = Dispatcher::new(group.iter().map(|target| {
            (
                target.function_name.clone(),
                CliLogger::new(&target.path, with_prefix),
            )
        }));
        let client = RealTimeLogClient::new(url, sources.signer.clone(), sources.real_time);
        let mut events = client.spawn(cancel_token.clone());
        tasks.spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    LogStreamEvent::Log(record) => dispatcher.print(&record),
                    LogStreamEvent::Connect => debug!("Logs WebSocket connected"),
                    LogStreamEvent::Disconnect => warn!("Logs WebSocket disconnected, reconnecting"),
                    LogStreamEvent::Error(err) => return Err(err),
                }
            }
            Ok(())
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                cancel_token.cancel();
                return Err(err);
            }
            Err(err) => error!("Tail task failed: {err}"),
        }
    }
    Ok(())
}
