// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod error;
pub mod format;
pub mod manifest;
pub mod parser;
pub mod record;

pub use error::CoreError;
pub use parser::{parse, LogEventKind, ParsedLogEvent};
pub use record::{LogLevel, LogRecord};
