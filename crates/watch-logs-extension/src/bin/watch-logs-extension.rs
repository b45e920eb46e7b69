// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use anyhow::Context;
use std::{env, io, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use watch_logs_bridge::push::ApiGatewayPushTarget;
use watch_logs_bridge::registry::DynamoDbRegistry;
use watch_logs_bridge::Fanout;
use watch_logs_extension::{
    config::ExtensionConfig,
    extensions_api::ExtensionsApiClient,
    listener,
    logger::Formatter,
    logs_api::SubscriptionRequest,
    runtime::{cancel_on_signal, RuntimeApi},
    ExtensionRuntime, FanoutPublisher, LogQueue,
};

const DEFAULT_EXTENSION_NAME: &str = "watch-logs-extension";

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let log_level = env::var("WATCH_LOGS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .event_format(Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install the log subscriber")?;

    let config = match ExtensionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error creating extension config: {e}");
            return Err(e.into());
        }
    };

    let queue = LogQueue::new();
    let cancel_token = CancellationToken::new();

    let listener_handle = listener::try_start(
        &config.receiver_host,
        config.receiver_port,
        queue.clone(),
        config.function_name.clone(),
        cancel_token.clone(),
    )
    .await;

    let registry = DynamoDbRegistry::from_env(config.connection_table_name.clone()).await;
    let target = ApiGatewayPushTarget::from_env(&config.management_url).await;
    let publisher = FanoutPublisher::new(
        Fanout::new(Arc::new(registry), Arc::new(target)),
        config.function_name.clone(),
    );

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build the runtime API client")?;
    let control = RuntimeApi::new(
        client.clone(),
        ExtensionsApiClient::new(client, config.extensions_api_url(), extension_name()),
        config.logs_api_url(),
        listener_handle
            .is_some()
            .then(|| SubscriptionRequest::for_receiver(config.receiver_uri())),
    );

    tokio::spawn(cancel_on_signal(wait_for_signal(), cancel_token.clone()));

    let mut runtime = ExtensionRuntime::new(
        queue,
        Arc::new(publisher),
        config.flush_delay,
        cancel_token.clone(),
    );
    let result = runtime.run(&control).await;
    debug!("Extension loop finished in state {:?}", runtime.state());

    cancel_token.cancel();
    if let Some(handle) = listener_handle {
        handle.abort();
    }
    result.map_err(Into::into)
}

/// The platform identifies an extension by its executable name
fn extension_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| DEFAULT_EXTENSION_NAME.to_string())
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
