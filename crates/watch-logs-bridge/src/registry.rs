// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Durable table of open developer-terminal connections.
//!
//! Rows are keyed by the transport-assigned connection id. Writes are
//! idempotent and deleting a missing row succeeds, so duplicate connect or
//! disconnect events are harmless. The table may hold stale rows between a
//! client dying silently and the next failed push to it.

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::RegistryError;

const CONNECTION_ID_ATTRIBUTE: &str = "connectionId";
const FUNCTION_IDS_ATTRIBUTE: &str = "lambdaIds";

/// A registered developer terminal session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub connection_id: String,
    /// Function identities requested at connect time
    pub function_ids: Vec<String>,
}

#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    async fn put(&self, connection_id: &str, function_ids: &[String]) -> Result<(), RegistryError>;
    async fn delete(&self, connection_id: &str) -> Result<(), RegistryError>;
    /// Every row, no secondary index
    async fn scan(&self) -> Result<Vec<Connection>, RegistryError>;
}

/// Process-local registry, used where no durable table is available (tests, local runs)
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    rows: Mutex<BTreeMap<String, Vec<String>>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryRegistry {
    async fn put(&self, connection_id: &str, function_ids: &[String]) -> Result<(), RegistryError> {
        let mut rows = self.rows.lock().map_err(|_| RegistryError::Put {
            connection_id: connection_id.to_string(),
            message: "registry lock poisoned".to_string(),
        })?;
        rows.insert(connection_id.to_string(), function_ids.to_vec());
        Ok(())
    }

    async fn delete(&self, connection_id: &str) -> Result<(), RegistryError> {
        let mut rows = self.rows.lock().map_err(|_| RegistryError::Delete {
            connection_id: connection_id.to_string(),
            message: "registry lock poisoned".to_string(),
        })?;
        rows.remove(connection_id);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Connection>, RegistryError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| RegistryError::Scan("registry lock poisoned".to_string()))?;
        Ok(rows
            .iter()
            .map(|(connection_id, function_ids)| Connection {
                connection_id: connection_id.clone(),
                function_ids: function_ids.clone(),
            })
            .collect())
    }
}

/// Registry backed by a DynamoDB table with `connectionId` as partition key
#[derive(Debug, Clone)]
pub struct DynamoDbRegistry {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoDbRegistry {
    #[must_use]
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_dynamodb::Client::new(&sdk_config), table_name)
    }

    fn connection_from_item(item: &HashMap<String, AttributeValue>) -> Option<Connection> {
        let connection_id = item.get(CONNECTION_ID_ATTRIBUTE)?.as_s().ok()?.clone();
        let function_ids = item
            .get(FUNCTION_IDS_ATTRIBUTE)
            .and_then(|value| value.as_l().ok())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|value| value.as_s().ok().cloned())
                    .collect()
            })
            .unwrap_or_default();
        Some(Connection {
            connection_id,
            function_ids,
        })
    }
}

#[async_trait]
impl ConnectionRegistry for DynamoDbRegistry {
    async fn put(&self, connection_id: &str, function_ids: &[String]) -> Result<(), RegistryError> {
        let function_ids = function_ids
            .iter()
            .map(|id| AttributeValue::S(id.clone()))
            .collect();
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(
                CONNECTION_ID_ATTRIBUTE,
                AttributeValue::S(connection_id.to_string()),
            )
            .item(FUNCTION_IDS_ATTRIBUTE, AttributeValue::L(function_ids))
            .send()
            .await
            .map_err(|err| RegistryError::Put {
                connection_id: connection_id.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;
        debug!("Stored connection {connection_id}");
        Ok(())
    }

    async fn delete(&self, connection_id: &str) -> Result<(), RegistryError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(
                CONNECTION_ID_ATTRIBUTE,
                AttributeValue::S(connection_id.to_string()),
            )
            .send()
            .await
            .map_err(|err| RegistryError::Delete {
                connection_id: connection_id.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;
        debug!("Deleted connection {connection_id}");
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Connection>, RegistryError> {
        let mut connections = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| RegistryError::Scan(DisplayErrorContext(&err).to_string()))?;

            for item in output.items() {
                match Self::connection_from_item(item) {
                    Some(connection) => connections.push(connection),
                    None => warn!("Skipping connection row without a {CONNECTION_ID_ATTRIBUTE}"),
                }
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let registry = InMemoryRegistry::new();
        let ids = vec!["fn-a".to_string()];
        registry.put("c1", &ids).await.unwrap();
        registry.put("c1", &ids).await.unwrap();
        let rows = registry.scan().await.unwrap();
        assert_eq!(
            rows,
            vec![Connection {
                connection_id: "c1".to_string(),
                function_ids: ids
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_harmless() {
        let registry = InMemoryRegistry::new();
        registry.put("c1", &["fn".to_string()]).await.unwrap();
        registry.delete("c1").await.unwrap();
        registry.delete("c1").await.unwrap();
        assert!(registry.scan().await.unwrap().is_empty());
    }

    #[test]
    fn test_connection_from_item() {
        let item = HashMap::from([
            (
                CONNECTION_ID_ATTRIBUTE.to_string(),
                AttributeValue::S("abc=".to_string()),
            ),
            (
                FUNCTION_IDS_ATTRIBUTE.to_string(),
                AttributeValue::L(vec![
                    AttributeValue::S("fn-a".to_string()),
                    AttributeValue::S("fn-b".to_string()),
                ]),
            ),
        ]);
        let connection = DynamoDbRegistry::connection_from_item(&item).unwrap();
        assert_eq!(connection.connection_id, "abc=");
        assert_eq!(connection.function_ids, vec!["fn-a", "fn-b"]);
    }

    #[test]
    fn test_connection_from_item_without_function_ids() {
        let item = HashMap::from([(
            CONNECTION_ID_ATTRIBUTE.to_string(),
            AttributeValue::S("abc=".to_string()),
        )]);
        let connection = DynamoDbRegistry::connection_from_item(&item).unwrap();
        assert!(connection.function_ids.is_empty());
    }

    #[test]
    fn test_connection_from_item_requires_id() {
        let item = HashMap::from([(
            FUNCTION_IDS_ATTRIBUTE.to_string(),
            AttributeValue::L(vec![]),
        )]);
        assert!(DynamoDbRegistry::connection_from_item(&item).is_none());
    }
}
