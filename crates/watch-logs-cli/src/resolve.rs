// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Maps manifest logical ids onto deployed function names and log endpoints.

use async_trait::async_trait;
use aws_config::SdkConfig;
use futures_util::future::try_join_all;
use tracing::debug;
use watch_logs_core::manifest::{LambdaManifestEntry, Manifest};

use crate::error::ResolveError;

pub const LOG_ENDPOINT_STAGE: &str = "v1";

/// Lookups against the deployed stacks.
#[async_trait]
pub trait StackResources: Send + Sync {
    async fn physical_resource_id(
        &self,
        stack_name: &str,
        logical_id: &str,
    ) -> Result<String, ResolveError>;

    async fn api_endpoint(&self, api_id: &str) -> Result<String, ResolveError>;
}

pub struct AwsStackResources {
    cloudformation: aws_sdk_cloudformation::Client,
    apigateway: aws_sdk_apigatewayv2::Client,
}

impl AwsStackResources {
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            cloudformation: aws_sdk_cloudformation::Client::new(config),
            apigateway: aws_sdk_apigatewayv2::Client::new(config),
        }
    }
}

#[async_trait]
impl StackResources for AwsStackResources {
    async fn physical_resource_id(
        &self,
        stack_name: &str,
        logical_id: &str,
    ) -> Result<String, ResolveError> {
        let output = self
            .cloudformation
            .describe_stack_resource()
            .stack_name(stack_name)
            .logical_resource_id(logical_id)
            .send()
            .await
            .map_err(|err| ResolveError::Sdk {
                operation: "DescribeStackResource",
                message: aws_sdk_cloudformation::error::DisplayErrorContext(&err).to_string(),
            })?;

        output
            .stack_resource_detail()
            .and_then(|detail| detail.physical_resource_id())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::MissingResource {
                stack_name: stack_name.to_string(),
                logical_id: logical_id.to_string(),
            })
    }

    async fn api_endpoint(&self, api_id: &str) -> Result<String, ResolveError> {
        let output = self
            .apigateway
            .get_api()
            .api_id(api_id)
            .send()
            .await
            .map_err(|err| ResolveError::Sdk {
                operation: "GetApi",
                message: aws_sdk_apigatewayv2::error::DisplayErrorContext(&err).to_string(),
            })?;

        output
            .api_endpoint()
            .filter(|endpoint| !endpoint.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::MissingEndpoint(api_id.to_string()))
    }
}

/// Walks the nested stacks from the root down to the stack owning the function.
pub async fn resolve_stack_name(
    resources: &dyn StackResources,
    entry: &LambdaManifestEntry,
) -> Result<String, ResolveError> {
    let mut stack_name = entry.root_stack_name.clone();
    for nested in &entry.nested_stack_logical_ids {
        stack_name = resources.physical_resource_id(&stack_name, nested).await?;
    }
    Ok(stack_name)
}

pub async fn resolve_function_name(
    resources: &dyn StackResources,
    entry: &LambdaManifestEntry,
) -> Result<String, ResolveError> {
    let stack_name = resolve_stack_name(resources, entry).await?;
    resources
        .physical_resource_id(&stack_name, &entry.lambda_logical_id)
        .await
}

/// `<api endpoint>/v1` when real-time logging was deployed for the function.
pub async fn resolve_log_endpoint(
    resources: &dyn StackResources,
    entry: &LambdaManifestEntry,
) -> Result<Option<String>, ResolveError> {
    let Some(ids) = entry.real_time_logs() else {
        return Ok(None);
    };
    let missing = |err: ResolveError| match err {
        ResolveError::MissingResource { .. } => {
            ResolveError::MissingEndpoint(ids.api_logical_id.to_string())
        }
        other => other,
    };

    let logs_stack = resources
        .physical_resource_id(&entry.root_stack_name, ids.stack_logical_id)
        .await
        .map_err(missing)?;
    let api_id = resources
        .physical_resource_id(&logs_stack, ids.api_logical_id)
        .await
        .map_err(missing)?;
    let endpoint = resources.api_endpoint(&api_id).await?;
    Ok(Some(format!(
        "{}/{LOG_ENDPOINT_STAGE}",
        endpoint.trim_end_matches('/')
    )))
}

/// A manifest lambda bound to its deployed resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaTarget {
    pub path: String,
    pub function_name: String,
    pub log_endpoint: Option<String>,
}

async fn resolve_target(
    resources: &dyn StackResources,
    path: &str,
    entry: &LambdaManifestEntry,
) -> Result<LambdaTarget, ResolveError> {
    let function_name = resolve_function_name(resources, entry).await?;
    let log_endpoint = resolve_log_endpoint(resources, entry).await?;
    debug!(
        "Resolved {path} to {function_name}, real-time endpoint: {}",
        log_endpoint.as_deref().unwrap_or("none")
    );
    Ok(LambdaTarget {
        path: path.to_string(),
        function_name,
        log_endpoint,
    })
}

/// Resolves every lambda of `manifest` concurrently, in manifest order.
pub async fn resolve_targets(
    resources: &dyn StackResources,
    manifest: &Manifest,
) -> Result<Vec<LambdaTarget>, ResolveError> {
    try_join_all(
        manifest
            .lambdas
            .iter()
            .map(|(path, entry)| resolve_target(resources, path, entry)),
    )
    .await
}
