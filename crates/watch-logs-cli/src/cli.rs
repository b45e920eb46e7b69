// Copyright 2025-Present cdk-watch contributors
// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_MANIFEST_PATH: &str = "cdk.out/manifest.cdk-watch.json";

#[derive(Debug, Parser)]
#[command(name = "cdk-watch-logs", version, about = "Tail the logs of watched Lambda functions")]
pub struct Cli {
    /// Path of the watch manifest written at synth time
    #[arg(long, global = true, default_value = DEFAULT_MANIFEST_PATH)]
    pub manifest: PathBuf,

    /// AWS profile used for every AWS call
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[arg(long, global = true, env = "WATCH_LOGS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List the watchable lambdas, optionally narrowed by a path glob
    #[command(visible_alias = "ls")]
    List { path_glob: Option<String> },

    /// Tail the logs of every lambda matching the path glob
    Logs {
        path_glob: String,

        /// Poll CloudWatch even where real-time logs are deployed
        #[arg(long)]
        force_cloudwatch: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_arguments() {
        let cli = Cli::try_parse_from([
            "cdk-watch-logs",
            "logs",
            "App/**",
            "--force-cloudwatch",
            "--profile",
            "dev",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Logs {
                path_glob: "App/**".to_string(),
                force_cloudwatch: true,
            }
        );
        assert_eq!(cli.profile.as_deref(), Some("dev"));
        assert_eq!(cli.manifest, PathBuf::from(DEFAULT_MANIFEST_PATH));
    }

    #[test]
    fn test_list_glob_is_optional() {
        let cli = Cli::try_parse_from(["cdk-watch-logs", "ls"]).unwrap();
        assert_eq!(cli.command, Command::List { path_glob: None });
    }

    #[test]
    fn test_logs_requires_glob() {
        assert!(Cli::try_parse_from(["cdk-watch-logs", "logs"]).is_err());
    }
}
