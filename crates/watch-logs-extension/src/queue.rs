// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared ordered buffer of captured records.
//!
//! Appends and drains are short critical sections. A drain swaps the buffer
//! for an empty one, so a record appended while a batch is being published
//! lands in the next batch instead of being lost.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use watch_logs_core::LogRecord;

#[derive(Debug, Clone, Default)]
pub struct LogQueue {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: LogRecord) {
        self.lock().push(record);
    }

    pub fn extend(&self, records: impl IntoIterator<Item = LogRecord>) {
        self.lock().extend(records);
    }

    /// Takes every queued record in insertion order, leaving the queue empty.
    #[must_use]
    pub fn drain(&self) -> Vec<LogRecord> {
        mem::take(&mut *self.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave a Vec half-written, keep going.
    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
