// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::BridgeError;
use std::env;

pub const CONNECTION_TABLE_ENV: &str = "CDK_WATCH_CONNECTION_TABLE_NAME";
pub const MANAGEMENT_URL_ENV: &str = "CDK_WATCH_API_GATEWAY_MANAGEMENT_URL";

/// Settings shared by the connection handlers and the push path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Table holding one row per open developer connection
    pub connection_table_name: String,
    /// Management endpoint used to post to connections; only the push path needs it
    pub management_url: Option<String>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, BridgeError> {
        let config = Self {
            connection_table_name: env::var(CONNECTION_TABLE_ENV).unwrap_or_default(),
            management_url: env::var(MANAGEMENT_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.connection_table_name.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(format!(
                "{CONNECTION_TABLE_ENV} must be set"
            )));
        }
        if let Some(url) = &self.management_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(BridgeError::InvalidConfig(format!(
                    "{MANAGEMENT_URL_ENV} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }

    pub fn require_management_url(&self) -> Result<&str, BridgeError> {
        self.management_url.as_deref().ok_or_else(|| {
            BridgeError::InvalidConfig(format!("{MANAGEMENT_URL_ENV} must be set"))
        })
    }
}
