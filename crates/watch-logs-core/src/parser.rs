// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Classification of raw lines read from the platform's archival log store.
//!
//! Lines are tried in a fixed priority order:
//!
//! 1. `START` / `END` / `REPORT` platform lifecycle lines
//! 2. Known platform error strings
//! 3. Whole-line JSON
//! 4. Fewer than three tab separated parts: unknown
//! 5. Native runtime lines (`<date>\t<requestId>\t[<LEVEL>\t]<text>` or
//!    `<LEVEL>\t<date>\t<requestId>\t<text>`)
//! 6. Anything else: unknown
//!
//! Parsing is pure: the same line always yields the same [`LogEventKind`]
//! regardless of the timestamp it was received with.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

const KNOWN_NATIVE_LOG_LEVELS: [&str; 3] = ["ERROR", "INFO", "WARN"];
const KNOWN_ERROR_MESSAGES: [&str; 2] = [
    "Unknown application error occurredError",
    "Process exited before completing request",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEventKind {
    Start,
    End,
    Report,
    JsonLog,
    NativeLog,
    Error,
    Unknown,
}

impl LogEventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEventKind::Start => "START",
            LogEventKind::End => "END",
            LogEventKind::Report => "REPORT",
            LogEventKind::JsonLog => "JSON_LOG",
            LogEventKind::NativeLog => "NATIVE_LOG",
            LogEventKind::Error => "ERROR",
            LogEventKind::Unknown => "UNKNOWN",
        }
    }

    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            LogEventKind::Start | LogEventKind::End | LogEventKind::Report
        )
    }
}

impl fmt::Display for LogEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a parsed line: either text or a decoded JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum LogMessage {
    Text(String),
    Json(Value),
}

impl LogMessage {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            LogMessage::Text(text) => Some(text),
            LogMessage::Json(_) => None,
        }
    }
}

/// Statistics carried by a `REPORT` line, kept verbatim (units included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub duration: Option<String>,
    pub billed_duration: Option<String>,
    pub memory_size: Option<String>,
    pub max_memory_used: Option<String>,
    pub init_duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogInfo {
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
    pub level: Option<String>,
    pub report: Option<ReportStats>,
}

impl LogInfo {
    fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            request_id: None,
            level: None,
            report: None,
        }
    }
}

/// Normalized view of one raw platform log line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLogEvent {
    pub raw: String,
    pub event: LogEventKind,
    pub message: LogMessage,
    pub info: LogInfo,
}

impl ParsedLogEvent {
    fn text(raw: &str, event: LogEventKind, message: String, info: LogInfo) -> Self {
        Self {
            raw: raw.to_string(),
            event,
            message: LogMessage::Text(message),
            info,
        }
    }

    fn unknown(raw: &str, timestamp: DateTime<Utc>) -> Self {
        Self::text(raw, LogEventKind::Unknown, raw.to_string(), LogInfo::at(timestamp))
    }
}

impl fmt::Display for ParsedLogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format::format(self))
    }
}

/// Classifies `line` received at `timestamp`.
#[must_use]
pub fn parse(line: &str, timestamp: DateTime<Utc>) -> ParsedLogEvent {
    let msg = line.trim_end_matches(['\r', '\n']);

    if msg.starts_with("START") {
        let fields = lifecycle_fields(msg, "START");
        return lifecycle_event(msg, LogEventKind::Start, &fields, timestamp);
    }
    if msg.starts_with("END") {
        let fields = lifecycle_fields(msg, "END");
        return lifecycle_event(msg, LogEventKind::End, &fields, timestamp);
    }
    if msg.starts_with("REPORT") {
        let fields = lifecycle_fields(msg, "REPORT");
        let mut event = lifecycle_event(msg, LogEventKind::Report, &fields, timestamp);
        event.info.report = Some(ReportStats {
            duration: fields.get("Duration").cloned(),
            billed_duration: fields.get("Billed Duration").cloned(),
            memory_size: fields.get("Memory Size").cloned(),
            max_memory_used: fields.get("Max Memory Used").cloned(),
            init_duration: fields.get("Init Duration").cloned(),
        });
        return event;
    }

    let trimmed = msg.trim();
    if KNOWN_ERROR_MESSAGES.contains(&trimmed) {
        let mut info = LogInfo::at(timestamp);
        info.level = Some("ERROR".to_string());
        return ParsedLogEvent::text(msg, LogEventKind::Error, trimmed.to_string(), info);
    }

    if let Ok(json) = serde_json::from_str::<Value>(msg) {
        return ParsedLogEvent {
            raw: msg.to_string(),
            event: LogEventKind::JsonLog,
            message: LogMessage::Json(json),
            info: LogInfo::at(timestamp),
        };
    }

    let parts: Vec<&str> = msg.split('\t').collect();
    if parts.len() < 3 {
        return ParsedLogEvent::unknown(msg, timestamp);
    }

    let (date, request_id, level, text) = if let Some(date) = parse_date(parts[0]) {
        if KNOWN_NATIVE_LOG_LEVELS.contains(&parts[2]) {
            (date, parts[1], Some(parts[2]), parts[3..].join("\t"))
        } else {
            (date, parts[1], None, parts[2..].join("\t"))
        }
    } else if let Some(date) = parse_date(parts[1]) {
        (date, parts[2], Some(parts[0]), parts[3..].join("\t"))
    } else {
        return ParsedLogEvent::unknown(msg, timestamp);
    };

    let info = LogInfo {
        timestamp: date,
        request_id: (request_id != "undefined").then(|| request_id.to_string()),
        level: level.map(|level| level.trim_matches(['[', ']']).to_string()),
        report: None,
    };
    ParsedLogEvent::text(msg, LogEventKind::NativeLog, text, info)
}

fn lifecycle_event(
    msg: &str,
    event: LogEventKind,
    fields: &HashMap<String, String>,
    timestamp: DateTime<Utc>,
) -> ParsedLogEvent {
    let mut info = LogInfo::at(timestamp);
    info.request_id = fields.get("RequestId").cloned();
    ParsedLogEvent::text(msg, event, msg.to_string(), info)
}

/// Splits `<PREFIX> Key: value\tKey: value` into a map.
///
/// `START` lines separate their fields with spaces instead of tabs, so only
/// the request id is extracted from them.
fn lifecycle_fields(msg: &str, prefix: &str) -> HashMap<String, String> {
    let body = msg.strip_prefix(prefix).unwrap_or(msg).trim_start();

    if prefix == "START" {
        let request_id = body
            .strip_prefix("RequestId: ")
            .unwrap_or(body)
            .split(" Version: ")
            .next()
            .unwrap_or_default()
            .trim();
        return HashMap::from([("RequestId".to_string(), request_id.to_string())]);
    }

    body.split('\t')
        .filter_map(|part| part.split_once(": "))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn parse_date(token: &str) -> Option<DateTime<Utc>> {
    let token = token.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(token) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(token, format).ok())
        .map(|naive| naive.and_utc())
}
