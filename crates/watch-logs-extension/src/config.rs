// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::ExtensionError;
use std::env;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use watch_logs_bridge::config::{CONNECTION_TABLE_ENV, MANAGEMENT_URL_ENV};

pub const DEFAULT_RECEIVER_PORT: u16 = 4243;
pub const DEFAULT_RECEIVER_HOST: &str = "sandbox";
pub const DEFAULT_FLUSH_DELAY_MS: u64 = 100;

/// Maximum time in milliseconds that the platform buffers a batch
pub const BUFFERING_TIMEOUT_MS: u64 = 100;
/// Maximum size in bytes that the platform buffers in memory
pub const BUFFERING_MAX_BYTES: u64 = 262_144;
/// Maximum number of events that the platform buffers in memory
pub const BUFFERING_MAX_ITEMS: u64 = 1000;

/// Configuration of the log forwarding extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConfig {
    /// `host:port` of the runtime API, set by the platform
    pub runtime_api: String,
    /// Name of the function the extension runs beside
    pub function_name: String,
    pub connection_table_name: String,
    pub management_url: String,
    /// Port of the local platform log receiver
    pub receiver_port: u16,
    /// Hostname the platform uses to reach the receiver
    pub receiver_host: String,
    /// Wait before draining so late platform lines of an invocation are included
    pub flush_delay: Duration,
    pub log_level: String,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            runtime_api: String::new(),
            function_name: String::new(),
            connection_table_name: String::new(),
            management_url: String::new(),
            receiver_port: DEFAULT_RECEIVER_PORT,
            receiver_host: DEFAULT_RECEIVER_HOST.to_string(),
            flush_delay: Duration::from_millis(DEFAULT_FLUSH_DELAY_MS),
            log_level: "info".to_string(),
        }
    }
}

impl ExtensionConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ExtensionError> {
        let receiver_port = env::var("WATCH_LOGS_RECEIVER_PORT")
            .ok()
            .and_then(|port| port.parse::<u16>().ok())
            .unwrap_or(DEFAULT_RECEIVER_PORT);
        let receiver_host = env::var("WATCH_LOGS_RECEIVER_HOST")
            .ok()
            .filter(|host| !host.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RECEIVER_HOST.to_string());
        let flush_delay = env::var("WATCH_LOGS_FLUSH_DELAY_MS")
            .ok()
            .and_then(|delay| delay.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FLUSH_DELAY_MS);
        let log_level = env::var("WATCH_LOGS_LOG_LEVEL")
            .map(|val| log_level_or_info(val.to_lowercase()))
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            runtime_api: env::var("AWS_LAMBDA_RUNTIME_API").unwrap_or_default(),
            function_name: env::var("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default(),
            connection_table_name: env::var(CONNECTION_TABLE_ENV).unwrap_or_default(),
            management_url: env::var(MANAGEMENT_URL_ENV).unwrap_or_default(),
            receiver_port,
            receiver_host,
            flush_delay: Duration::from_millis(flush_delay),
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExtensionError> {
        let required = [
            ("AWS_LAMBDA_RUNTIME_API", &self.runtime_api),
            ("AWS_LAMBDA_FUNCTION_NAME", &self.function_name),
            (CONNECTION_TABLE_ENV, &self.connection_table_name),
            (MANAGEMENT_URL_ENV, &self.management_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ExtensionError::InvalidConfig(format!("{name} must be set")));
            }
        }

        if self.receiver_port == 0 {
            return Err(ExtensionError::InvalidConfig(
                "Receiver port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL of the extensions API
    #[must_use]
    pub fn extensions_api_url(&self) -> String {
        format!("http://{}/2020-01-01/extension", self.runtime_api)
    }

    /// Endpoint of the logs subscription API
    #[must_use]
    pub fn logs_api_url(&self) -> String {
        format!("http://{}/2020-08-15/logs", self.runtime_api)
    }

    /// URI the platform posts log batches to
    #[must_use]
    pub fn receiver_uri(&self) -> String {
        format!("http://{}:{}", self.receiver_host, self.receiver_port)
    }
}

/// Keeps any filter directive list such as `debug,hyper=off`. Anything the
/// filter cannot parse falls back to `info`.
fn log_level_or_info(level: String) -> String {
    if EnvFilter::try_new(&level).is_ok() {
        level
    } else {
        warn!("Invalid log level '{level}', falling back to info");
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid() -> ExtensionConfig {
        ExtensionConfig {
            runtime_api: "127.0.0.1:9001".to_string(),
            function_name: "my-function".to_string(),
            connection_table_name: "connections".to_string(),
            management_url: "https://abc.execute-api.eu-west-1.amazonaws.com/v1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_default_config_is_missing_required_values() {
        let err = ExtensionConfig::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: AWS_LAMBDA_RUNTIME_API must be set"
        );
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = ExtensionConfig {
            receiver_port: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_accepts_directives() {
        assert_eq!(log_level_or_info("warn".to_string()), "warn");
        assert_eq!(log_level_or_info("debug,hyper=off".to_string()), "debug,hyper=off");
    }

    #[test]
    fn test_log_level_falls_back_to_info() {
        assert_eq!(log_level_or_info("debug,hyper=loudest".to_string()), "info");
    }

    #[test]
    #[serial]
    fn test_from_env_log_directives() {
        env::set_var("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001");
        env::set_var("AWS_LAMBDA_FUNCTION_NAME", "my-function");
        env::set_var(CONNECTION_TABLE_ENV, "connections");
        env::set_var(MANAGEMENT_URL_ENV, "https://abc.execute-api.eu-west-1.amazonaws.com/v1");

        env::set_var("WATCH_LOGS_LOG_LEVEL", "debug,hyper=off");
        assert_eq!(ExtensionConfig::from_env().unwrap().log_level, "debug,hyper=off");

        env::set_var("WATCH_LOGS_LOG_LEVEL", "debug,hyper=loudest");
        assert_eq!(ExtensionConfig::from_env().unwrap().log_level, "info");

        for name in [
            "AWS_LAMBDA_RUNTIME_API",
            "AWS_LAMBDA_FUNCTION_NAME",
            CONNECTION_TABLE_ENV,
            MANAGEMENT_URL_ENV,
            "WATCH_LOGS_LOG_LEVEL",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_urls() {
        let config = valid();
        assert_eq!(
            config.extensions_api_url(),
            "http://127.0.0.1:9001/2020-01-01/extension"
        );
        assert_eq!(config.logs_api_url(), "http://127.0.0.1:9001/2020-08-15/logs");
        assert_eq!(config.receiver_uri(), "http://sandbox:4243");
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001");
        env::set_var("AWS_LAMBDA_FUNCTION_NAME", "my-function");
        env::set_var(CONNECTION_TABLE_ENV, "connections");
        env::set_var(MANAGEMENT_URL_ENV, "https://abc.execute-api.eu-west-1.amazonaws.com/v1");
        env::set_var("WATCH_LOGS_RECEIVER_PORT", "5000");
        env::set_var("WATCH_LOGS_FLUSH_DELAY_MS", "not-a-number");
        env::set_var("WATCH_LOGS_LOG_LEVEL", "DEBUG");

        let config = ExtensionConfig::from_env().unwrap();
        assert_eq!(config.receiver_port, 5000);
        assert_eq!(config.receiver_host, "sandbox");
        assert_eq!(config.flush_delay, Duration::from_millis(100));
        assert_eq!(config.log_level, "debug");

        env::remove_var("AWS_LAMBDA_FUNCTION_NAME");
        assert!(ExtensionConfig::from_env().is_err());

        for name in [
            "AWS_LAMBDA_RUNTIME_API",
            CONNECTION_TABLE_ENV,
            MANAGEMENT_URL_ENV,
            "WATCH_LOGS_RECEIVER_PORT",
            "WATCH_LOGS_FLUSH_DELAY_MS",
            "WATCH_LOGS_LOG_LEVEL",
        ] {
            env::remove_var(name);
        }
    }
}
