// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Errors raised while loading or narrowing the watch manifest
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("cdk-watch manifest file was not found at {0}")]
    ManifestNotFound(PathBuf),

    #[error("Failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    #[error("Invalid lambda path pattern '{pattern}': {message}")]
    InvalidPathPattern { pattern: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::ManifestNotFound(PathBuf::from("cdk.out/manifest.cdk-watch.json"));
        assert_eq!(
            error.to_string(),
            "cdk-watch manifest file was not found at cdk.out/manifest.cdk-watch.json"
        );
    }

    #[test]
    fn test_invalid_pattern_display() {
        let error = CoreError::InvalidPathPattern {
            pattern: "[".to_string(),
            message: "invalid range pattern".to_string(),
        };
        assert!(error.to_string().contains("'['"));
    }
}
