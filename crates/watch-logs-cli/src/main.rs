// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use anyhow::Context;
use clap::Parser;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use watch_logs_cli::cli::{Cli, Command};
use watch_logs_cli::commands;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,{}",
        cli.log_level.to_lowercase()
    );
    // stdout carries the function logs, diagnostics go to stderr
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install the log subscriber")?;

    // websocket TLS and the AWS clients share one process-wide provider
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        debug!("A TLS crypto provider was already installed");
    }

    match cli.command {
        Command::List { path_glob } => commands::list(&cli.manifest, path_glob.as_deref()),
        Command::Logs {
            path_glob,
            force_cloudwatch,
        } => {
            let cancel_token = CancellationToken::new();
            let signal_token = cancel_token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    debug!("Interrupted, stopping");
                    signal_token.cancel();
                }
            });
            commands::logs(
                &cli.manifest,
                &path_glob,
                cli.profile.as_deref(),
                force_cloudwatch,
                cancel_token,
            )
            .await
        }
    }
}
