// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

//! Read-only view of the watch manifest written by the synthesis step.
//!
//! ```json
//! {
//!   "region": "eu-west-1",
//!   "lambdas": {
//!     "App/Api/Handler": {
//!       "assetPath": "asset.1234",
//!       "esbuildOptions": {},
//!       "lambdaLogicalId": "Handler886CB40B",
//!       "rootStackName": "App",
//!       "nestedStackLogicalIds": [],
//!       "realTimeLogsApiLogicalId": "LogsApi",
//!       "realTimeLogsStackLogicalId": "LogsStack"
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::CoreError;

pub const MANIFEST_FILE_NAME: &str = "manifest.cdk-watch.json";
pub const CDK_OUT_DIR: &str = "cdk.out";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub region: String,
    #[serde(default)]
    pub lambdas: BTreeMap<String, LambdaManifestEntry>,
}

/// Static deployment metadata of one function, keyed by its logical path.
///
/// Only the real-time logging identifiers are interpreted here; the build
/// options are carried as an opaque document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaManifestEntry {
    pub asset_path: String,
    #[serde(default)]
    pub esbuild_options: Value,
    pub lambda_logical_id: String,
    pub root_stack_name: String,
    #[serde(default)]
    pub nested_stack_logical_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_time_logs_api_logical_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_time_logs_stack_logical_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_modules_layer_version: Option<String>,
}

/// Logical ids locating a function's real-time logs API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealTimeLogsIds<'a> {
    pub stack_logical_id: &'a str,
    pub api_logical_id: &'a str,
}

impl LambdaManifestEntry {
    /// Both ids must be present; otherwise real-time logging was not provisioned.
    #[must_use]
    pub fn real_time_logs(&self) -> Option<RealTimeLogsIds<'_>> {
        match (
            self.real_time_logs_stack_logical_id.as_deref(),
            self.real_time_logs_api_logical_id.as_deref(),
        ) {
            (Some(stack), Some(api)) if !stack.is_empty() && !api.is_empty() => {
                Some(RealTimeLogsIds {
                    stack_logical_id: stack,
                    api_logical_id: api,
                })
            }
            _ => None,
        }
    }
}

impl Manifest {
    /// `<dir>/cdk.out/manifest.cdk-watch.json`
    #[must_use]
    pub fn default_path(dir: &Path) -> PathBuf {
        dir.join(CDK_OUT_DIR).join(MANIFEST_FILE_NAME)
    }

    pub fn read(path: &Path) -> Result<Self, CoreError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CoreError::ManifestNotFound(path.to_path_buf())
            } else {
                CoreError::ManifestRead {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let manifest: Manifest = serde_json::from_str(&contents)?;
        debug!(
            "Loaded manifest with {} lambdas from {}",
            manifest.lambdas.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Keeps the lambdas whose logical path matches the glob `pattern`.
    pub fn filter_by_path(&self, pattern: &str) -> Result<Self, CoreError> {
        let matcher =
            glob::Pattern::new(pattern).map_err(|err| CoreError::InvalidPathPattern {
                pattern: pattern.to_string(),
                message: err.msg.to_string(),
            })?;
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let lambdas = self
            .lambdas
            .iter()
            .filter(|(path, _)| matcher.matches_with(path, options))
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect();
        Ok(Self {
            region: self.region.clone(),
            lambdas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Manifest {
        serde_json::from_value(json!({
            "region": "eu-west-1",
            "lambdas": {
                "App/Api/Handler": {
                    "assetPath": "asset.1",
                    "esbuildOptions": {"minify": true},
                    "lambdaLogicalId": "Handler1",
                    "rootStackName": "App",
                    "nestedStackLogicalIds": ["ApiStack"],
                    "realTimeLogsApiLogicalId": "LogsApi",
                    "realTimeLogsStackLogicalId": "LogsStack"
                },
                "App/Worker/Handler": {
                    "assetPath": "asset.2",
                    "esbuildOptions": {},
                    "lambdaLogicalId": "Handler2",
                    "rootStackName": "App",
                    "nestedStackLogicalIds": []
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_real_time_logs_requires_both_ids() {
        let manifest = sample();
        let api = &manifest.lambdas["App/Api/Handler"];
        assert_eq!(
            api.real_time_logs(),
            Some(RealTimeLogsIds {
                stack_logical_id: "LogsStack",
                api_logical_id: "LogsApi"
            })
        );
        let worker = &manifest.lambdas["App/Worker/Handler"];
        assert_eq!(worker.real_time_logs(), None);

        let mut half = api.clone();
        half.real_time_logs_api_logical_id = None;
        assert_eq!(half.real_time_logs(), None);
    }

    #[test]
    fn test_filter_by_path() {
        let manifest = sample();
        let filtered = manifest.filter_by_path("App/Api/*").unwrap();
        assert_eq!(filtered.region, "eu-west-1");
        assert_eq!(
            filtered.lambdas.keys().collect::<Vec<_>>(),
            vec!["App/Api/Handler"]
        );

        let all = manifest.filter_by_path("**").unwrap();
        assert_eq!(all.lambdas.len(), 2);

        let none = manifest.filter_by_path("Other/*").unwrap();
        assert!(none.lambdas.is_empty());
    }

    #[test]
    fn test_single_star_does_not_cross_separator() {
        let filtered = sample().filter_by_path("App/*").unwrap();
        assert!(filtered.lambdas.is_empty());
    }

    #[test]
    fn test_filter_rejects_invalid_pattern() {
        let err = sample().filter_by_path("App/[").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPathPattern { .. }));
    }

    #[test]
    fn test_default_path() {
        assert_eq!(
            Manifest::default_path(Path::new("/work")),
            PathBuf::from("/work/cdk.out/manifest.cdk-watch.json")
        );
    }
}
