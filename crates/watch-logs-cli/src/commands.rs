// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{bail, Context};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use watch_logs_core::manifest::Manifest;

use crate::cloudwatch::CloudWatchLogsSource;
use crate::realtime::RealTimeConfig;
use crate::resolve::{resolve_targets, AwsStackResources};
use crate::signing::{RequestSigner, SigV4Signer};
use crate::tail::{tail_lambdas, TailSources};

pub fn read_manifest(path: &Path, path_glob: Option<&str>) -> anyhow::Result<Manifest> {
    let manifest = Manifest::read(path)?;
    match path_glob {
        Some(pattern) => Ok(manifest.filter_by_path(pattern)?),
        None => Ok(manifest),
    }
}

#[must_use]
pub fn list_lines(manifest: &Manifest) -> Vec<String> {
    manifest
        .lambdas
        .keys()
        .map(|path| format!("- {}", style(path).blue()))
        .collect()
}

pub fn list(manifest_path: &Path, path_glob: Option<&str>) -> anyhow::Result<()> {
    let manifest = read_manifest(manifest_path, path_glob)?;
    for line in list_lines(&manifest) {
        println!("{line}");
    }
    Ok(())
}

pub async fn load_sdk_config(region: &str, profile: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

pub async fn logs(
    manifest_path: &Path,
    path_glob: &str,
    profile: Option<&str>,
    force_cloudwatch: bool,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let manifest = read_manifest(manifest_path, Some(path_glob))?;
    if manifest.lambdas.is_empty() {
        bail!("No lambdas in the manifest match {path_glob}");
    }

    let sdk_config = load_sdk_config(&manifest.region, profile).await;
    let targets = resolve_targets(&AwsStackResources::new(&sdk_config), &manifest)
        .await
        .context("Failed to resolve the deployed lambdas")?;

    let needs_signer = !force_cloudwatch && targets.iter().any(|target| target.log_endpoint.is_some());
    let signer: Option<Arc<dyn RequestSigner>> = if needs_signer {
        Some(Arc::new(SigV4Signer::from_sdk_config(&sdk_config)?))
    } else {
        None
    };
    let sources = TailSources {
        logs: Arc::new(CloudWatchLogsSource::new(&sdk_config)),
        signer,
        real_time: RealTimeConfig::default(),
    };

    info!("Tailing logs of {} lambdas", targets.len());
    tail_lambdas(&targets, force_cloudwatch, &sources, cancel_token).await?;
    Ok(())
}
