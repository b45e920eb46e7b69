// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Local HTTP receiver for platform log batches.
//!
//! The platform `POST`s a JSON array of `{time, type, record}` entries. Each
//! entry is normalised into a [`LogRecord`] and appended to the queue. Any
//! other method is answered with `200 OK` and ignored, and a malformed batch
//! is logged and acknowledged so the platform does not retry it.

use bytes::Bytes;
use chrono::DateTime;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{http, Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use watch_logs_core::record::now_millis;
use watch_logs_core::{parse, LogLevel, LogRecord};

use crate::error::ExtensionError;
use crate::queue::LogQueue;

/// One entry of a platform log batch
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlatformLog {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(rename = "type")]
    pub log_type: String,
    #[serde(default)]
    pub record: Value,
}

/// Converts a platform entry into a record attributed to `function_name`.
///
/// `function` entries are the raw output lines: the native level token is
/// used when the line carries one, otherwise `info`. Everything else
/// (`platform.start`, `platform.report`, ...) is kept as a `debug` record
/// whose payload is the record object.
#[must_use]
pub fn normalize(entry: PlatformLog, function_name: &str) -> LogRecord {
    let date = entry
        .time
        .as_deref()
        .and_then(|time| DateTime::parse_from_rfc3339(time).ok())
        .map_or_else(now_millis, |time| time.timestamp_millis());

    let (level, payload) = match (entry.log_type.as_str(), entry.record) {
        ("function", Value::String(line)) => {
            let parsed = parse(&line, chrono::Utc::now());
            let level = parsed
                .info
                .level
                .as_deref()
                .and_then(LogLevel::from_token)
                .unwrap_or(LogLevel::Info);
            let text = line.trim_end_matches(['\r', '\n']).to_string();
            (level, vec![Value::String(text)])
        }
        (_, record) => (LogLevel::Debug, vec![record]),
    };

    LogRecord {
        level,
        payload,
        date,
        function_identity: Some(function_name.to_string()),
    }
}

struct ListenerState {
    queue: LogQueue,
    function_name: String,
}

/// Binds `host:port` and serves until `cancel_token` fires.
pub async fn start(
    host: &str,
    port: u16,
    queue: LogQueue,
    function_name: String,
    cancel_token: CancellationToken,
) -> Result<JoinHandle<Result<(), ExtensionError>>, ExtensionError> {
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|e| ExtensionError::Listener(format!("failed to bind {host}:{port}: {e}")))?;
    debug!("Listening for platform logs on {host}:{port}");
    Ok(tokio::spawn(serve(
        listener,
        queue,
        function_name,
        cancel_token,
    )))
}

/// Like [`start`], but a receiver that cannot bind only costs the platform
/// lines. The failure is logged and `None` is returned.
pub async fn try_start(
    host: &str,
    port: u16,
    queue: LogQueue,
    function_name: String,
    cancel_token: CancellationToken,
) -> Option<JoinHandle<Result<(), ExtensionError>>> {
    match start(host, port, queue, function_name, cancel_token).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Platform logs will not be forwarded: {e}");
            None
        }
    }
}

pub async fn serve(
    listener: TcpListener,
    queue: LogQueue,
    function_name: String,
    cancel_token: CancellationToken,
) -> Result<(), ExtensionError> {
    let state = Arc::new(ListenerState {
        queue,
        function_name,
    });
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        handle(req, state)
    });

    let server = hyper::server::conn::http1::Builder::new();
    let mut joinset = tokio::task::JoinSet::new();

    loop {
        let conn = tokio::select! {
            () = cancel_token.cancelled() => {
                debug!("Platform log listener stopped");
                return Ok(());
            }
            con_res = listener.accept() => match con_res {
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Platform log listener error: {e}");
                    return Err(ExtensionError::Listener(e.to_string()));
                }
                Ok((conn, _)) => conn,
            },
            finished = async {
                match joinset.join_next().await {
                    Some(finished) => finished,
                    None => std::future::pending().await,
                }
            } => match finished {
                Err(e) if e.is_panic() => {
                    error!("Connection handler panicked: {:?}", e);
                    continue;
                },
                Ok(()) | Err(_) => continue,
            },
        };
        let conn = hyper_util::rt::TokioIo::new(conn);
        let server = server.clone();
        let service = service.clone();
        joinset.spawn(async move {
            if let Err(e) = server.serve_connection(conn, service).await {
                error!("Connection error: {e}");
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<ListenerState>,
) -> http::Result<Response<Full<Bytes>>> {
    if req.method() != Method::POST {
        return log_and_create_http_response(
            &format!("Ignoring {} request", req.method()),
            StatusCode::OK,
        );
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return log_and_create_http_response(
                &format!("Failed to read platform log batch: {e}"),
                StatusCode::BAD_REQUEST,
            );
        }
    };

    match serde_json::from_slice::<Vec<PlatformLog>>(&body) {
        Ok(batch) => {
            let count = batch.len();
            state.queue.extend(
                batch
                    .into_iter()
                    .map(|entry| normalize(entry, &state.function_name)),
            );
            log_and_create_http_response(
                &format!("Queued {count} platform log records"),
                StatusCode::OK,
            )
        }
        Err(e) => {
            error!("Failed to parse platform log batch: {e}");
            log_and_create_http_response("Discarded malformed platform log batch", StatusCode::OK)
        }
    }
}

/// Logs `message` (debug on success, error otherwise) and answers with it.
/// Successful responses carry `OK` as their body.
fn log_and_create_http_response(
    message: &str,
    status: StatusCode,
) -> http::Result<Response<Full<Bytes>>> {
    let body = if status.is_success() {
        debug!("{message}");
        Bytes::from_static(b"OK")
    } else {
        error!("{message}");
        Bytes::from(message.to_string())
    };
    Response::builder().status(status).body(Full::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(log_type: &str, record: Value) -> PlatformLog {
        PlatformLog {
            time: Some("2024-01-01T10:00:00.000Z".to_string()),
            log_type: log_type.to_string(),
            record,
        }
    }

    #[test]
    fn test_normalize_function_line_with_level() {
        let record = normalize(
            entry(
                "function",
                json!("2024-01-01T10:00:00.000Z\tabc-123\tERROR\tsomething broke\n"),
            ),
            "my-function",
        );
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(
            record.payload,
            vec![json!("2024-01-01T10:00:00.000Z\tabc-123\tERROR\tsomething broke")]
        );
        assert_eq!(record.date, 1_704_103_200_000);
        assert_eq!(record.function_identity.as_deref(), Some("my-function"));
    }

    #[test]
    fn test_normalize_plain_function_line() {
        let record = normalize(entry("function", json!("hello\n")), "my-function");
        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.payload, vec![json!("hello")]);
    }

    #[test]
    fn test_normalize_platform_record() {
        let report = json!({"requestId": "abc-123", "metrics": {"durationMs": 12.3}});
        let record = normalize(entry("platform.report", report.clone()), "my-function");
        assert_eq!(record.level, LogLevel::Debug);
        assert_eq!(record.payload, vec![report]);
    }

    #[test]
    fn test_normalize_without_time() {
        let before = now_millis();
        let record = normalize(
            PlatformLog {
                time: None,
                log_type: "platform.start".to_string(),
                record: json!({}),
            },
            "my-function",
        );
        assert!(record.date >= before);
    }
}
