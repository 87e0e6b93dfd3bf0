#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use anyhow::Result;
use cli::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Used when RUST_LOG is unset or unparsable
const DEFAULT_LOG_FILTER: &str = "unet_seg=info";

/// RUST_LOG wins outright; otherwise the crate logs at info.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn main() -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .init();

    let cli = Cli::parse();
    cli.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_can_enable_debug() {
        assert_eq!(log_filter(Some("unet_seg=debug")).to_string(), "unet_seg=debug");
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
    }

    #[test]
    fn test_default_filter_without_rust_log() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(Some("  ")).to_string(), DEFAULT_LOG_FILTER);
    }
}
