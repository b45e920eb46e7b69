// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use tracing::debug;

use crate::config::{BUFFERING_MAX_BYTES, BUFFERING_MAX_ITEMS, BUFFERING_TIMEOUT_MS};
use crate::error::ExtensionError;
use crate::extensions_api::EXTENSION_ID_HEADER;

/// Body of the platform log subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    pub destination: Destination,
    pub types: Vec<String>,
    pub buffering: Buffering,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub protocol: String,
    #[serde(rename = "URI")]
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffering {
    pub timeout_ms: u64,
    pub max_bytes: u64,
    pub max_items: u64,
}

impl SubscriptionRequest {
    /// Function and platform logs, delivered over HTTP to `receiver_uri`
    #[must_use]
    pub fn for_receiver(receiver_uri: String) -> Self {
        Self {
            destination: Destination {
                protocol: "HTTP".to_string(),
                uri: receiver_uri,
            },
            types: vec!["function".to_string(), "platform".to_string()],
            buffering: Buffering {
                timeout_ms: BUFFERING_TIMEOUT_MS,
                max_bytes: BUFFERING_MAX_BYTES,
                max_items: BUFFERING_MAX_ITEMS,
            },
        }
    }
}

/// Asks the platform to push log batches to the local receiver
pub async fn subscribe(
    client: &reqwest::Client,
    logs_api_url: &str,
    extension_id: &str,
    request: &SubscriptionRequest,
) -> Result<(), ExtensionError> {
    let response = client
        .put(logs_api_url)
        .header(EXTENSION_ID_HEADER, extension_id)
        .json(request)
        .send()
        .await
        .map_err(|e| ExtensionError::Subscription(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ExtensionError::Subscription(format!(
            "status {status}: {body}"
        )));
    }
    debug!("Subscribed to platform logs at {}", request.destination.uri);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_body() {
        let request = SubscriptionRequest::for_receiver("http://sandbox:4243".to_string());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "destination": {"protocol": "HTTP", "URI": "http://sandbox:4243"},
                "types": ["function", "platform"],
                "buffering": {"timeoutMs": 100, "maxBytes": 262144, "maxItems": 1000}
            })
        );
    }
}
