// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod backoff;
pub mod cli;
pub mod cloudwatch;
pub mod commands;
pub mod error;
pub mod realtime;
pub mod resolve;
pub mod signing;
pub mod tail;
pub mod terminal;

pub use error::{PollError, RealTimeError, ResolveError};
