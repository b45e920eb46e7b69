// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

/// Failures while turning manifest logical ids into deployed resources
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Could not find resource {logical_id} in stack {stack_name}")]
    MissingResource {
        stack_name: String,
        logical_id: String,
    },

    #[error("Could not find resource for real-time logs api, make sure your stack is up-to-date")]
    MissingEndpoint(String),

    #[error("{operation} failed: {message}")]
    Sdk { operation: &'static str, message: String },
}

/// Failures of a single CloudWatch poll
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("Log group {0} does not exist")]
    LogGroupNotFound(String),

    #[error("CloudWatch Logs request failed: {0}")]
    Sdk(String),
}

/// Failures of the real-time log connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealTimeError {
    #[error("Invalid real-time logs endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Failed to load AWS credentials: {0}")]
    Credentials(String),

    #[error("Failed to sign connection request: {0}")]
    Signing(String),

    #[error("Real-time logs endpoint rejected the connection with status {status}")]
    Handshake { status: u16 },

    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    #[error("WebSocket Error: gave up after {attempts} failed connection attempts, last error: {last_error}")]
    GaveUp { attempts: u32, last_error: String },
}

impl RealTimeError {
    /// Errors that no reconnection attempt can fix
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RealTimeError::Connect(_) | RealTimeError::Credentials(_))
    }
}
