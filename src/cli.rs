// src/cli.rs

//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::loader::DEFAULT_GRAPH_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Run a job graph with approval gates.
#[derive(Debug, Parser)]
#[command(name = "gatedag", version, about)]
pub struct CliArgs {
    /// Path to the graph file.
    #[arg(short, long, default_value = DEFAULT_GRAPH_FILE)]
    pub config: PathBuf,

    /// Validate the graph and print the execution plan without running
    /// any job.
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (overrides GATEDAG_LOG).
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Webhook endpoint notified about approval requests.
    #[arg(long, env = "GATEDAG_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Chat incoming-webhook URL (Slack-compatible) for approval
    /// notifications.
    #[arg(long, env = "GATEDAG_CHAT_WEBHOOK_URL")]
    pub chat_webhook_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::parse_from(["gatedag"]);
        assert_eq!(args.config, PathBuf::from("Gatedag.toml"));
        assert!(!args.dry_run);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn parses_flags() {
        let args = CliArgs::parse_from([
            "gatedag",
            "--config",
            "release.toml",
            "--dry-run",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.config, PathBuf::from("release.toml"));
        assert!(args.dry_run);
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }
}
