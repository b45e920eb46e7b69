// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Handlers bound to the websocket route keys of the real-time logs API.
//!
//! They are invoked by the API, never by the watch tooling itself.

use tracing::{debug, error};

use crate::registry::ConnectionRegistry;

pub const CONNECT_ROUTE: &str = "$connect";
pub const DISCONNECT_ROUTE: &str = "$disconnect";
pub const DEFAULT_ROUTE: &str = "$default";

/// Name of the query parameter listing the requested function identities
pub const FUNCTIONS_QUERY_PARAMETER: &str = "lambdas";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    fn new(status_code: u16, body: &str) -> Self {
        Self {
            status_code,
            body: body.to_string(),
        }
    }
}

/// Splits the comma separated `lambdas` parameter, dropping blank entries.
#[must_use]
pub fn function_ids_from_query(lambdas: Option<&str>) -> Vec<String> {
    lambdas
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn on_connect(
    registry: &dyn ConnectionRegistry,
    connection_id: &str,
    lambdas: Option<&str>,
) -> HandlerResponse {
    let function_ids = function_ids_from_query(lambdas);
    if function_ids.is_empty() {
        return HandlerResponse::new(400, "You must provide at least one lambda parameter");
    }

    match registry.put(connection_id, &function_ids).await {
        Ok(()) => {
            debug!(
                "Connection {connection_id} subscribed to {}",
                function_ids.join(",")
            );
            HandlerResponse::new(200, "Connected.")
        }
        Err(err) => {
            error!("{err}");
            HandlerResponse::new(500, "Failed to connect.")
        }
    }
}

pub async fn on_disconnect(registry: &dyn ConnectionRegistry, connection_id: &str) -> HandlerResponse {
    match registry.delete(connection_id).await {
        Ok(()) => HandlerResponse::new(200, "Disconnected."),
        Err(err) => {
            error!("{err}");
            HandlerResponse::new(500, "Failed to disconnect.")
        }
    }
}

/// Keep-alive route: `ping` gets `pong`, anything else is unprocessable.
#[must_use]
pub fn on_message(body: Option<&str>) -> HandlerResponse {
    match body {
        Some("ping") => HandlerResponse::new(200, "pong"),
        _ => HandlerResponse::new(422, "wrong"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_ids_from_query() {
        assert_eq!(function_ids_from_query(Some("a,b")), vec!["a", "b"]);
        assert_eq!(function_ids_from_query(Some(" a , ,b ")), vec!["a", "b"]);
        assert!(function_ids_from_query(Some("")).is_empty());
        assert!(function_ids_from_query(None).is_empty());
    }

    #[test]
    fn test_on_message() {
        assert_eq!(on_message(Some("ping")), HandlerResponse::new(200, "pong"));
        assert_eq!(on_message(Some("PING")).status_code, 422);
        assert_eq!(on_message(None).status_code, 422);
    }
}
