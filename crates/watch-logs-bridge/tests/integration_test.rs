// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing_test::traced_test;

use watch_logs_bridge::handlers::{on_connect, on_disconnect};
use watch_logs_bridge::push::PushTarget;
use watch_logs_bridge::registry::{ConnectionRegistry, InMemoryRegistry};
use watch_logs_bridge::{Connection, Fanout, FanoutReport, PushError, RegistryError};
use watch_logs_core::{LogLevel, LogRecord};

enum Scripted {
    Accept,
    Gone,
    Fail,
}

struct ScriptedTarget {
    script: HashMap<String, Scripted>,
    attempts: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTarget {
    fn new(script: Vec<(&str, Scripted)>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|(id, outcome)| (id.to_string(), outcome))
                .collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl PushTarget for ScriptedTarget {
    async fn post(&self, connection_id: &str, data: &[u8]) -> Result<(), PushError> {
        self.attempts
            .lock()
            .unwrap()
            .push((connection_id.to_string(), data.to_vec()));
        match self.script.get(connection_id) {
            Some(Scripted::Gone) => Err(PushError::Gone(connection_id.to_string())),
            Some(Scripted::Fail) => Err(PushError::Transport {
                connection_id: connection_id.to_string(),
                message: "internal server error".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

struct BrokenRegistry;

#[async_trait]
impl ConnectionRegistry for BrokenRegistry {
    async fn put(&self, connection_id: &str, _function_ids: &[String]) -> Result<(), RegistryError> {
        Err(RegistryError::Put {
            connection_id: connection_id.to_string(),
            message: "throttled".to_string(),
        })
    }

    async fn delete(&self, connection_id: &str) -> Result<(), RegistryError> {
        Err(RegistryError::Delete {
            connection_id: connection_id.to_string(),
            message: "throttled".to_string(),
        })
    }

    async fn scan(&self) -> Result<Vec<Connection>, RegistryError> {
        Err(RegistryError::Scan("throttled".to_string()))
    }
}

fn batch() -> Vec<LogRecord> {
    vec![
        LogRecord::new(LogLevel::Info, vec![json!("first")]).with_function_identity("fn-a"),
        LogRecord::new(LogLevel::Error, vec![json!("second"), json!({"code": 7})])
            .with_function_identity("fn-a"),
    ]
}

async fn registry_with(ids: &[&str]) -> Arc<InMemoryRegistry> {
    let registry = Arc::new(InMemoryRegistry::new());
    for id in ids {
        registry.put(id, &["fn-a".to_string()]).await.unwrap();
    }
    registry
}

#[tokio::test]
async fn gone_connection_is_removed_and_others_still_receive() {
    let registry = registry_with(&["conn-1", "conn-2", "conn-3"]).await;
    let target = Arc::new(ScriptedTarget::new(vec![
        ("conn-1", Scripted::Accept),
        ("conn-2", Scripted::Gone),
        ("conn-3", Scripted::Accept),
    ]));
    let fanout = Fanout::new(registry.clone(), target.clone());

    let report = fanout.push(&batch()).await.unwrap();

    assert_eq!(
        report,
        FanoutReport {
            delivered: 2,
            gone: 1,
            failed: 0
        }
    );
    assert_eq!(target.attempted(), vec!["conn-1", "conn-2", "conn-3"]);
    let remaining: Vec<String> = registry
        .scan()
        .await
        .unwrap()
        .into_iter()
        .map(|connection| connection.connection_id)
        .collect();
    assert_eq!(remaining, vec!["conn-1", "conn-3"]);
}

#[tokio::test]
#[traced_test]
async fn transport_failure_keeps_the_row_and_is_logged() {
    let registry = registry_with(&["conn-1", "conn-2"]).await;
    let target = Arc::new(ScriptedTarget::new(vec![("conn-1", Scripted::Fail)]));
    let fanout = Fanout::new(registry.clone(), target.clone());

    let report = fanout.push(&batch()).await.unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(registry.scan().await.unwrap().len(), 2);
    assert!(logs_contain("Failed to send log batch"));
}

#[tokio::test]
async fn every_connection_receives_the_serialized_batch() {
    let registry = registry_with(&["conn-1"]).await;
    let target = Arc::new(ScriptedTarget::new(vec![]));
    let fanout = Fanout::new(registry, target.clone());

    let sent = batch();
    fanout.push(&sent).await.unwrap();

    let attempts = target.attempts.lock().unwrap();
    let decoded: Vec<LogRecord> = serde_json::from_slice(&attempts[0].1).unwrap();
    assert_eq!(decoded, sent);
}

#[tokio::test]
async fn scan_failure_is_reported_without_sending() {
    let target = Arc::new(ScriptedTarget::new(vec![]));
    let fanout = Fanout::new(Arc::new(BrokenRegistry), target.clone());

    let err = fanout.push(&batch()).await.unwrap_err();

    assert!(err.to_string().contains("throttled"));
    assert!(target.attempted().is_empty());
}

#[tokio::test]
async fn connect_requires_a_function_identity() {
    let registry = InMemoryRegistry::new();

    let response = on_connect(&registry, "conn-1", None).await;
    assert_eq!(response.status_code, 400);
    let response = on_connect(&registry, "conn-1", Some("")).await;
    assert_eq!(response.status_code, 400);
    assert!(registry.scan().await.unwrap().is_empty());
}

#[tokio::test]
async fn connect_then_disconnect_round_trip() {
    let registry = InMemoryRegistry::new();

    let response = on_connect(&registry, "conn-1", Some("fn-a,fn-b")).await;
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "Connected.");
    assert_eq!(
        registry.scan().await.unwrap(),
        vec![Connection {
            connection_id: "conn-1".to_string(),
            function_ids: vec!["fn-a".to_string(), "fn-b".to_string()],
        }]
    );

    // duplicate connect events are harmless
    assert_eq!(on_connect(&registry, "conn-1", Some("fn-a,fn-b")).await.status_code, 200);
    assert_eq!(registry.scan().await.unwrap().len(), 1);

    assert_eq!(on_disconnect(&registry, "conn-1").await.status_code, 200);
    assert_eq!(on_disconnect(&registry, "conn-1").await.status_code, 200);
    assert!(registry.scan().await.unwrap().is_empty());
}

#[tokio::test]
async fn registry_failures_map_to_server_errors() {
    let registry = BrokenRegistry;
    let response = on_connect(&registry, "conn-1", Some("fn-a")).await;
    assert_eq!(response.status_code, 500);
    assert_eq!(response.body, "Failed to connect.");
    let response = on_disconnect(&registry, "conn-1").await;
    assert_eq!(response.status_code, 500);
}
