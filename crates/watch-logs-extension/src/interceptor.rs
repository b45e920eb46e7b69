// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Capture of the function's own output.
//!
//! [`Console`] wraps the real output sinks: every call records a
//! [`LogRecord`] on the shared queue, then writes the same arguments to the
//! sink the level normally goes to (stdout for `log`/`debug`/`info`, stderr
//! for the rest). [`CaptureLayer`] does the same for code that logs through
//! `tracing`.
//!
//! Neither ever returns an error to the caller. A failed write to a sink is
//! dropped, the record is already queued.

use serde_json::{Map, Value};
use std::fmt;
use std::io::{self, Stderr, Stdout, Write};
use std::sync::{Mutex, PoisonError};
use tracing::field::{Field, Visit};
use tracing_core::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use watch_logs_core::{record::render_payload, LogLevel, LogRecord};

use crate::queue::LogQueue;

pub struct Console<O, E> {
    queue: LogQueue,
    stdout: Mutex<O>,
    stderr: Mutex<E>,
}

impl Console<Stdout, Stderr> {
    /// Console writing through to the process streams
    #[must_use]
    pub fn stdio(queue: LogQueue) -> Self {
        Self::new(queue, io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(queue: LogQueue, stdout: O, stderr: E) -> Self {
        Self {
            queue,
            stdout: Mutex::new(stdout),
            stderr: Mutex::new(stderr),
        }
    }

    pub fn log(&self, args: &[Value]) {
        self.emit(LogLevel::Info, args);
    }

    pub fn debug(&self, args: &[Value]) {
        self.emit(LogLevel::Debug, args);
    }

    pub fn info(&self, args: &[Value]) {
        self.emit(LogLevel::Info, args);
    }

    pub fn warn(&self, args: &[Value]) {
        self.emit(LogLevel::Warn, args);
    }

    pub fn error(&self, args: &[Value]) {
        self.emit(LogLevel::Error, args);
    }

    pub fn trace(&self, args: &[Value]) {
        self.emit(LogLevel::Trace, args);
    }

    pub fn fatal(&self, args: &[Value]) {
        self.emit(LogLevel::Fatal, args);
    }

    pub fn emit(&self, level: LogLevel, args: &[Value]) {
        self.queue.push(LogRecord::new(level, args.to_vec()));

        let line = render_payload(args);
        if level.is_stderr() {
            write_line(&self.stderr, &line);
        } else {
            write_line(&self.stdout, &line);
        }
    }

    /// Returns the wrapped sinks, in `(stdout, stderr)` order.
    pub fn into_sinks(self) -> (O, E) {
        (
            self.stdout.into_inner().unwrap_or_else(PoisonError::into_inner),
            self.stderr.into_inner().unwrap_or_else(PoisonError::into_inner),
        )
    }
}

fn write_line<W: Write>(sink: &Mutex<W>, line: &str) {
    let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = writeln!(sink, "{line}");
    let _ = sink.flush();
}

/// `tracing` layer queueing every event as a [`LogRecord`].
///
/// The payload is the event message, followed by an object of the remaining
/// fields when there are any.
#[derive(Debug, Clone)]
pub struct CaptureLayer {
    queue: LogQueue,
}

impl CaptureLayer {
    #[must_use]
    pub fn new(queue: LogQueue) -> Self {
        Self { queue }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = PayloadVisitor::default();
        event.record(&mut visitor);
        self.queue.push(LogRecord::new(
            level_of(event.metadata().level()),
            visitor.into_payload(),
        ));
    }
}

fn level_of(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        Level::DEBUG => LogLevel::Debug,
        Level::TRACE => LogLevel::Trace,
    }
}

#[derive(Default)]
struct PayloadVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl PayloadVisitor {
    fn into_payload(self) -> Vec<Value> {
        let mut payload = Vec::with_capacity(2);
        if let Some(message) = self.message {
            payload.push(Value::String(message));
        }
        if !self.fields.is_empty() {
            payload.push(Value::Object(self.fields));
        }
        payload
    }

    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for PayloadVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.insert(field, Value::String(format!("{value:?}")));
        }
    }
}
