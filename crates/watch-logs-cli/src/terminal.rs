// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-function terminal output.

use console::style;

pub const PREFIX_WIDTH: usize = 20;
const ELLIPSIS: char = '…';

/// Shortens `text` to `width` columns by cutting from the start, keeping the
/// most specific end of a logical path visible.
#[must_use]
pub fn truncate_start(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let tail: String = text.chars().skip(count - (width - 1)).collect();
    format!("{ELLIPSIS}{tail}")
}

/// Prints lines of one tailed function, prefixed with its path when several
/// functions share the terminal.
#[derive(Debug, Clone)]
pub struct CliLogger {
    prefix: Option<String>,
}

impl CliLogger {
    #[must_use]
    pub fn new(path: &str, with_prefix: bool) -> Self {
        let prefix = with_prefix.then(|| {
            format!(
                "[{}]",
                style(truncate_start(path, PREFIX_WIDTH)).black().bright()
            )
        });
        Self { prefix }
    }

    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    #[must_use]
    pub fn line(&self, message: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix} {message}"),
            None => message.to_string(),
        }
    }

    #[must_use]
    pub fn error_line(&self, message: &str) -> String {
        self.line(&style(message).red().to_string())
    }

    pub fn log(&self, message: &str) {
        println!("{}", self.line(message));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.error_line(message));
    }
}
