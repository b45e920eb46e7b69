// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal rendering of parsed log lines.

use chrono::Local;
use console::{style, StyledObject};
use serde_json::Value;

use crate::parser::{LogEventKind, LogMessage, ParsedLogEvent};

const KNOWN_ENVELOPE_LEVELS: [&str; 9] = [
    "emerg", "alert", "crit", "error", "warning", "warn", "notice", "info", "debug",
];

/// Renders `event` as a single display string prefixed with the local `MM:SS` time.
#[must_use]
pub fn format(event: &ParsedLogEvent) -> String {
    let local = event.info.timestamp.with_timezone(&Local);
    let time = format!(
        "{}{}{}",
        style(local.format("%M")).blue(),
        style(":").dim(),
        style(local.format("%S")).blue()
    );

    match event.event {
        LogEventKind::Start | LogEventKind::End | LogEventKind::Report => {
            let mut parts = vec![time, style(event.event.as_str()).yellow().to_string()];
            if let Some(request_id) = event.info.request_id.as_deref().filter(|id| !id.is_empty()) {
                parts.push(style(request_id).dim().to_string());
            }
            let header = parts.join(" ");
            match event.info.report.as_ref() {
                Some(report) if event.event == LogEventKind::Report => {
                    let stats = [
                        &report.duration,
                        &report.billed_duration,
                        &report.init_duration,
                        &report.max_memory_used,
                    ]
                    .into_iter()
                    .flatten()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                    format!("{header}: {stats}")
                }
                _ => header,
            }
        }
        LogEventKind::JsonLog | LogEventKind::NativeLog => {
            format!("{time} {}", format_json_log(&event.message))
        }
        LogEventKind::Error | LogEventKind::Unknown => match &event.message {
            LogMessage::Text(text) => format!("{time} {text}"),
            LogMessage::Json(value) => format!("{time} {value}"),
        },
    }
}

/// Pretty prints a JSON payload, unwrapping `{level, message}` envelopes into
/// a colored level prefix followed by the message.
#[must_use]
pub fn format_json_log(message: &LogMessage) -> String {
    let json = match message {
        LogMessage::Json(value) => value.clone(),
        LogMessage::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(_) => return text.clone(),
        },
    };

    if let Some((level, inner)) = level_envelope(&json) {
        let body = match inner {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(nested @ (Value::Object(_) | Value::Array(_))) => pretty(&nested),
                _ => text.clone(),
            },
            Value::Object(_) | Value::Array(_) => pretty(inner),
            other => other.to_string(),
        };
        return format!("[{}] {body}", color_for_level(level));
    }

    pretty(&json)
}

fn level_envelope(json: &Value) -> Option<(&str, &Value)> {
    let object = json.as_object()?;
    let level = object.get("level")?.as_str()?;
    let message = object.get("message")?;
    let is_empty = match message {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Bool(flag) => !flag,
        _ => false,
    };
    if is_empty || !KNOWN_ENVELOPE_LEVELS.contains(&level) {
        return None;
    }
    Some((level, message))
}

fn color_for_level(level: &str) -> StyledObject<&str> {
    match level {
        "emerg" => style(level).on_red().bright(),
        "alert" | "crit" => style(level).on_red(),
        "error" => style(level).red(),
        "warning" | "warn" => style(level).yellow(),
        "debug" => style(level).green(),
        _ => style(level).blue(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
