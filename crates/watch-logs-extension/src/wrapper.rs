// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::flush::{flush, Publisher};
use crate::queue::LogQueue;

pub const INVOCATION_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a handler invocation in-process, publishing captured records every
/// [`INVOCATION_FLUSH_INTERVAL`] while it runs and once more when it
/// completes. The handler output, success or error, is returned untouched.
pub async fn wrap_invocation<F, T>(queue: &LogQueue, publisher: &dyn Publisher, invocation: F) -> T
where
    F: Future<Output = T>,
{
    let done = CancellationToken::new();

    let periodic = async {
        let mut ticker = interval_at(
            Instant::now() + INVOCATION_FLUSH_INTERVAL,
            INVOCATION_FLUSH_INTERVAL,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = done.cancelled() => break,
                _ = ticker.tick() => {
                    flush(queue, publisher).await;
                }
            }
        }
    };
    let run = async {
        let output = invocation.await;
        done.cancel();
        output
    };

    let (output, ()) = tokio::join!(run, periodic);
    flush(queue, publisher).await;
    output
}
