// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod push;
pub mod registry;

pub use error::{BridgeError, PushError, RegistryError};
pub use fanout::{Fanout, FanoutReport};
pub use registry::{Connection, ConnectionRegistry};
