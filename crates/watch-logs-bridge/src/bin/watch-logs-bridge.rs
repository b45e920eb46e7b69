// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Lambda function hosting the `$connect`, `$disconnect` and `$default`
//! routes of the real-time logs websocket API.

use aws_lambda_events::apigw::{ApiGatewayProxyResponse, ApiGatewayWebsocketProxyRequest};
use aws_lambda_events::encodings::Body;
use lambda_runtime::{service_fn, LambdaEvent};
use std::env;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use watch_logs_bridge::config::BridgeConfig;
use watch_logs_bridge::handlers::{
    self, HandlerResponse, CONNECT_ROUTE, DISCONNECT_ROUTE, FUNCTIONS_QUERY_PARAMETER,
};
use watch_logs_bridge::registry::{ConnectionRegistry, DynamoDbRegistry};

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let log_level = env::var("WATCH_LOGS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_level(true)
        .with_target(true)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error creating bridge config: {e}");
            return Err(e.into());
        }
    };

    let registry: Arc<dyn ConnectionRegistry> =
        Arc::new(DynamoDbRegistry::from_env(config.connection_table_name).await);
    debug!("Connection handlers ready");

    lambda_runtime::run(service_fn(move |event| {
        let registry = Arc::clone(&registry);
        async move { route(registry.as_ref(), event).await }
    }))
    .await
}

async fn route(
    registry: &dyn ConnectionRegistry,
    event: LambdaEvent<ApiGatewayWebsocketProxyRequest>,
) -> Result<ApiGatewayProxyResponse, lambda_runtime::Error> {
    let (request, _context) = event.into_parts();
    let connection_id = request
        .request_context
        .connection_id
        .clone()
        .unwrap_or_default();
    let route_key = request.request_context.route_key.as_deref().unwrap_or_default();

    let response = match route_key {
        CONNECT_ROUTE => {
            handlers::on_connect(
                registry,
                &connection_id,
                request
                    .query_string_parameters
                    .first(FUNCTIONS_QUERY_PARAMETER),
            )
            .await
        }
        DISCONNECT_ROUTE => handlers::on_disconnect(registry, &connection_id).await,
        _ => handlers::on_message(request.body.as_deref()),
    };
    debug!("{route_key} for {connection_id} -> {}", response.status_code);
    Ok(to_proxy_response(response))
}

fn to_proxy_response(response: HandlerResponse) -> ApiGatewayProxyResponse {
    ApiGatewayProxyResponse {
        status_code: i64::from(response.status_code),
        body: Some(Body::Text(response.body)),
        ..Default::default()
    }
}
