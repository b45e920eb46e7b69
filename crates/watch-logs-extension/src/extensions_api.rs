// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Client of the platform's extension control API.
//!
//! `POST /register` declares interest in `INVOKE` and `SHUTDOWN`; the
//! identifier returned in the response headers is sent with every later call.
//! `GET /event/next` blocks until the platform has an event for the extension.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExtensionError;

pub const EXTENSION_NAME_HEADER: &str = "Lambda-Extension-Name";
pub const EXTENSION_ID_HEADER: &str = "Lambda-Extension-Identifier";

/// Lifecycle event handed out by `GET /event/next`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "eventType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextEvent {
    #[serde(rename_all = "camelCase")]
    Invoke {
        request_id: Option<String>,
        deadline_ms: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Shutdown {
        shutdown_reason: Option<String>,
        deadline_ms: Option<u64>,
    },
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    events: &'a [&'a str],
}

#[derive(Debug, Clone)]
pub struct ExtensionsApiClient {
    client: reqwest::Client,
    base_url: String,
    extension_name: String,
}

impl ExtensionsApiClient {
    /// `base_url` is `http://<runtime api>/2020-01-01/extension`. The client
    /// must not carry a request timeout, `next_event` is a long poll.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String, extension_name: String) -> Self {
        Self {
            client,
            base_url,
            extension_name,
        }
    }

    /// Registers for `INVOKE` and `SHUTDOWN` and returns the extension identifier.
    pub async fn register(&self) -> Result<String, ExtensionError> {
        let response = self
            .client
            .post(format!("{}/register", self.base_url))
            .header(EXTENSION_NAME_HEADER, &self.extension_name)
            .json(&RegisterRequest {
                events: &["INVOKE", "SHUTDOWN"],
            })
            .send()
            .await
            .map_err(|e| ExtensionError::Registration(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtensionError::Registration(format!(
                "status {status}: {body}"
            )));
        }

        let extension_id = response
            .headers()
            .get(EXTENSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ExtensionError::Registration(format!("response is missing {EXTENSION_ID_HEADER}"))
            })?;
        debug!("Registered extension {} as {extension_id}", self.extension_name);
        Ok(extension_id)
    }

    pub async fn next_event(&self, extension_id: &str) -> Result<NextEvent, ExtensionError> {
        let response = self
            .client
            .get(format!("{}/event/next", self.base_url))
            .header(EXTENSION_ID_HEADER, extension_id)
            .send()
            .await
            .map_err(|e| ExtensionError::NextEvent(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtensionError::NextEvent(format!("status {status}: {body}")));
        }

        response
            .json::<NextEvent>()
            .await
            .map_err(|e| ExtensionError::NextEvent(e.to_string()))
    }
}
