// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! SigV4 signing of the websocket upgrade request.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use http::Request;
use std::time::SystemTime;

use crate::error::RealTimeError;

pub const EXECUTE_API_SERVICE: &str = "execute-api";

/// Authenticates the upgrade request before it is sent.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    async fn sign(&self, request: &mut Request<()>) -> Result<(), RealTimeError>;
}

/// Signs with the caller's AWS credentials for the `execute-api` service.
pub struct SigV4Signer {
    credentials: SharedCredentialsProvider,
    region: String,
}

impl SigV4Signer {
    #[must_use]
    pub fn new(credentials: SharedCredentialsProvider, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }

    pub fn from_sdk_config(config: &SdkConfig) -> Result<Self, RealTimeError> {
        let credentials = config
            .credentials_provider()
            .ok_or_else(|| RealTimeError::Credentials("no credentials provider configured".to_string()))?;
        let region = config
            .region()
            .ok_or_else(|| RealTimeError::Signing("no region configured".to_string()))?;
        Ok(Self::new(credentials, region.as_ref()))
    }
}

#[async_trait]
impl RequestSigner for SigV4Signer {
    async fn sign(&self, request: &mut Request<()>) -> Result<(), RealTimeError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|err| RealTimeError::Credentials(err.to_string()))?;
        let identity: Identity = credentials.into();

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(EXECUTE_API_SERVICE)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|err| RealTimeError::Signing(err.to_string()))?
            .into();

        // only host and the amz headers are signed, the upgrade headers are added later
        let uri = request.uri().to_string();
        let signable = SignableRequest::new(
            request.method().as_str(),
            uri.as_str(),
            std::iter::empty(),
            SignableBody::Bytes(&[]),
        )
        .map_err(|err| RealTimeError::Signing(err.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|err| RealTimeError::Signing(err.to_string()))?
            .into_parts();
        instructions.apply_to_request_http1x(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::Credentials;

    fn signer() -> SigV4Signer {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", None, None, "test");
        SigV4Signer::new(SharedCredentialsProvider::new(credentials), "eu-west-1")
    }

    #[tokio::test]
    async fn test_sign_adds_authorization() {
        let mut request = Request::builder()
            .uri("wss://abc123.execute-api.eu-west-1.amazonaws.com/v1?lambdas=fn-a,fn-b")
            .body(())
            .unwrap();

        signer().sign(&mut request).await.unwrap();

        let authorization = request
            .headers()
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(authorization.contains("/eu-west-1/execute-api/aws4_request"));
        assert!(request.headers().contains_key("x-amz-date"));
    }

    #[tokio::test]
    async fn test_sign_keeps_query() {
        let mut request = Request::builder()
            .uri("wss://abc123.execute-api.eu-west-1.amazonaws.com/v1?lambdas=fn-a")
            .body(())
            .unwrap();

        signer().sign(&mut request).await.unwrap();

        assert_eq!(request.uri().query(), Some("lambdas=fn-a"));
    }
}
