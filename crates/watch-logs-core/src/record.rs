// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Log records captured inside the function sandbox and pushed to developer terminals.
//!
//! A [`LogRecord`] is one call to a console output function: the severity, the
//! original call arguments and the function that produced it. Batches of records
//! travel as a JSON array:
//!
//! ```text
//! [{"level":"info","log":["hello",{"a":1}],"date":1700000000000,"lambda":"my-fn"}]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity attached to a captured record.
///
/// `Fatal` has no native console counterpart; it is provided alongside the
/// other five so callers can emit it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Debug,
    Warn,
    Error,
    Trace,
    Fatal,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Trace,
        LogLevel::Fatal,
    ];

    /// Maps a level token found in platform log lines (`ERROR`, `WARN`, ...).
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            "TRACE" => Some(LogLevel::Trace),
            "FATAL" => Some(LogLevel::Fatal),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Trace => "trace",
            LogLevel::Fatal => "fatal",
        }
    }

    /// Whether a console writes this level to stderr rather than stdout.
    #[must_use]
    pub fn is_stderr(&self) -> bool {
        matches!(
            self,
            LogLevel::Warn | LogLevel::Error | LogLevel::Trace | LogLevel::Fatal
        )
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured line of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    /// The original call arguments, in order.
    #[serde(rename = "log", default)]
    pub payload: Vec<Value>,
    /// Milliseconds since the unix epoch at capture time.
    #[serde(default)]
    pub date: i64,
    /// Emitting function. Absent while the record sits in the sandbox queue.
    #[serde(rename = "lambda", default, skip_serializing_if = "Option::is_none")]
    pub function_identity: Option<String>,
}

impl LogRecord {
    #[must_use]
    pub fn new(level: LogLevel, payload: Vec<Value>) -> Self {
        Self {
            level,
            payload,
            date: now_millis(),
            function_identity: None,
        }
    }

    #[must_use]
    pub fn with_function_identity(mut self, function_identity: impl Into<String>) -> Self {
        self.function_identity = Some(function_identity.into());
        self
    }

    /// Renders the payload the way a console prints its arguments.
    #[must_use]
    pub fn render_payload(&self) -> String {
        render_payload(&self.payload)
    }
}

/// Strings are printed verbatim, every other value as compact JSON, joined by spaces.
#[must_use]
pub fn render_payload(payload: &[Value]) -> String {
    payload
        .iter()
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
