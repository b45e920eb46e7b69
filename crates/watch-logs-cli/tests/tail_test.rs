// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

use watch_logs_cli::cloudwatch::{FilteredEvent, LogEventSource};
use watch_logs_cli::realtime::RealTimeConfig;
use watch_logs_cli::resolve::LambdaTarget;
use watch_logs_cli::tail::{tail_lambdas, TailSources};
use watch_logs_cli::{PollError, RealTimeError};

struct QuietLogs;

#[async_trait]
impl LogEventSource for QuietLogs {
    async fn recent_streams(&self, _log_group: &str, _limit: i32) -> Result<Vec<String>, PollError> {
        Ok(Vec::new())
    }

    async fn filter_events(
        &self,
        _log_group: &str,
        _streams: &[String],
        _start_time: i64,
        _limit: i32,
    ) -> Result<Vec<FilteredEvent>, PollError> {
        Ok(Vec::new())
    }
}

fn sources() -> TailSources {
    TailSources {
        logs: Arc::new(QuietLogs),
        signer: None,
        real_time: RealTimeConfig::default(),
    }
}

fn target(path: &str, endpoint: Option<String>) -> LambdaTarget {
    LambdaTarget {
        path: path.to_string(),
        function_name: path.replace('/', "-"),
        log_endpoint: endpoint,
    }
}

#[tokio::test]
async fn cancellation_ends_the_session() {
    let targets = vec![target("App/A", None), target("App/B", None)];
    let cancel_token = CancellationToken::new();
    let canceller = cancel_token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        tail_lambdas(&targets, false, &sources(), cancel_token),
    )
    .await
    .expect("session did not stop");

    assert!(result.is_ok());
}

#[tokio::test]
async fn fatal_stream_error_ends_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/v1", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ = accept_hdr_async(stream, |_: &Request, _: Response| {
            Err::<Response, ErrorResponse>(
                http::Response::builder().status(401).body(None).unwrap(),
            )
        })
        .await;
    });
    let targets = vec![target("App/A", Some(endpoint)), target("App/B", None)];
    let cancel_token = CancellationToken::new();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        tail_lambdas(&targets, false, &sources(), cancel_token.clone()),
    )
    .await
    .expect("session did not stop");

    assert_eq!(result, Err(RealTimeError::Handshake { status: 401 }));
    assert!(cancel_token.is_cancelled());
}

#[tokio::test]
async fn forced_cloudwatch_never_connects() {
    let targets = vec![target("App/A", Some("ws://127.0.0.1:9/v1".to_string()))];
    let cancel_token = CancellationToken::new();
    let canceller = cancel_token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        tail_lambdas(&targets, true, &sources(), cancel_token),
    )
    .await
    .expect("session did not stop");

    assert!(result.is_ok());
}
