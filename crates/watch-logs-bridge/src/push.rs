// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::error::DisplayErrorContext;
use aws_sdk_apigatewaymanagement::primitives::Blob;

use crate::error::PushError;

const GONE_STATUS: u16 = 410;

/// Delivers one message to one connection
#[async_trait]
pub trait PushTarget: Send + Sync {
    async fn post(&self, connection_id: &str, data: &[u8]) -> Result<(), PushError>;
}

/// Posts through the API Gateway management API of the websocket endpoint
#[derive(Debug, Clone)]
pub struct ApiGatewayPushTarget {
    client: aws_sdk_apigatewaymanagement::Client,
}

impl ApiGatewayPushTarget {
    #[must_use]
    pub fn new(client: aws_sdk_apigatewaymanagement::Client) -> Self {
        Self { client }
    }

    /// `management_url` is the `https://<api>.execute-api.<region>.amazonaws.com/<stage>` endpoint
    pub async fn from_env(management_url: &str) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let config = aws_sdk_apigatewaymanagement::config::Builder::from(&sdk_config)
            .endpoint_url(management_url)
            .build();
        Self::new(aws_sdk_apigatewaymanagement::Client::from_conf(config))
    }
}

#[async_trait]
impl PushTarget for ApiGatewayPushTarget {
    async fn post(&self, connection_id: &str, data: &[u8]) -> Result<(), PushError> {
        match self
            .client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(data))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let gone = err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_gone_exception())
                    || err
                        .raw_response()
                        .is_some_and(|response| response.status().as_u16() == GONE_STATUS);
                if gone {
                    Err(PushError::Gone(connection_id.to_string()))
                } else {
                    Err(PushError::Transport {
                        connection_id: connection_id.to_string(),
                        message: DisplayErrorContext(&err).to_string(),
                    })
                }
            }
        }
    }
}
