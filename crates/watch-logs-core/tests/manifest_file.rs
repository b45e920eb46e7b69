// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use watch_logs_core::manifest::Manifest;
use watch_logs_core::CoreError;

const MANIFEST: &str = r#"{
  "region": "us-east-1",
  "lambdas": {
    "Stack/Fn": {
      "assetPath": "asset.abc",
      "esbuildOptions": {"bundle": true},
      "lambdaLogicalId": "FnABC",
      "rootStackName": "Stack",
      "nestedStackLogicalIds": ["Nested1", "Nested2"],
      "nodeModulesLayerVersion": "3"
    }
  }
}"#;

#[test]
fn reads_manifest_from_cdk_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = Manifest::default_path(dir.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, MANIFEST).unwrap();

    let manifest = Manifest::read(&path).expect("manifest should parse");
    assert_eq!(manifest.region, "us-east-1");
    let entry = &manifest.lambdas["Stack/Fn"];
    assert_eq!(entry.nested_stack_logical_ids, vec!["Nested1", "Nested2"]);
    assert_eq!(entry.node_modules_layer_version.as_deref(), Some("3"));
    assert!(entry.real_time_logs().is_none());
}

#[test]
fn missing_manifest_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Manifest::read(&Manifest::default_path(dir.path())).unwrap_err();
    assert!(matches!(err, CoreError::ManifestNotFound(_)));
}

#[test]
fn malformed_manifest_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("manifest.json");
    fs::write(&path, "{ not json").unwrap();
    let err = Manifest::read(&path).unwrap_err();
    assert!(matches!(err, CoreError::ManifestParse(_)));
}
