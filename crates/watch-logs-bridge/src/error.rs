// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

/// Failures of the durable connection table
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to store connection {connection_id}: {message}")]
    Put {
        connection_id: String,
        message: String,
    },

    #[error("Failed to delete connection {connection_id}: {message}")]
    Delete {
        connection_id: String,
        message: String,
    },

    #[error("Failed to scan for connections: {0}")]
    Scan(String),
}

/// Outcome of a single push to one connection
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The transport no longer knows the connection (HTTP 410)
    #[error("Connection {0} is gone")]
    Gone(String),

    #[error("Failed to post to connection {connection_id}: {message}")]
    Transport {
        connection_id: String,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to serialize log batch: {0}")]
    Serialize(#[from] serde_json::Error),
}
