// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Exponential reconnect delays for the real-time log connection.

use std::time::Duration;

/// Exponential backoff policy applied between failed connection attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound of any single delay.
    pub max_backoff: Duration,
    /// Multiplier applied for every further consecutive failure.
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

/// Counts consecutive failures; a successful connection starts over.
#[derive(Debug)]
pub struct BackoffState {
    config: BackoffConfig,
    error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            error_count: 0,
        }
    }

    /// Registers a failure and returns the delay before the next attempt.
    pub fn register_error(&mut self) -> Duration {
        self.error_count = self.error_count.saturating_add(1);
        // powi overflows to infinity long before the exponent matters, the cap below handles it
        let exponent = i32::try_from(self.error_count.saturating_sub(1).min(64)).unwrap_or(64);
        let delay = self.config.base.as_secs_f64() * self.config.factor.powi(exponent);
        Duration::from_secs_f64(delay.min(self.config.max_backoff.as_secs_f64()))
    }

    pub fn register_success(&mut self) {
        self.error_count = 0;
    }

    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }
}
