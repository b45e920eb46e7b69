// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod error;
pub mod extensions_api;
pub mod flush;
pub mod interceptor;
pub mod listener;
pub mod logger;
pub mod logs_api;
pub mod queue;
pub mod runtime;
pub mod wrapper;

pub use error::ExtensionError;
pub use flush::{FanoutPublisher, Publisher};
pub use queue::LogQueue;
pub use runtime::{ExtensionControl, ExtensionRuntime, RuntimeState};
pub use wrapper::wrap_invocation;
