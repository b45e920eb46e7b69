// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use watch_logs_bridge::BridgeError;

/// Errors raised by the extension process
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to register extension: {0}")]
    Registration(String),

    #[error("Failed to subscribe to platform logs: {0}")]
    Subscription(String),

    #[error("Failed to fetch next lifecycle event: {0}")]
    NextEvent(String),

    #[error("Platform log listener failed: {0}")]
    Listener(String),

    #[error("Failed to publish log batch: {0}")]
    Publish(#[from] BridgeError),
}
