//! `mcp-bridge` entry point.
//!
//! Parses CLI arguments, initialises tracing on stderr (stdout belongs to
//! the JSON-RPC channel), and runs the relay loop until EOF or shutdown.

use clap::Parser;

use mcp_bridge::bridge;
use mcp_bridge::cli::BridgeArgs;
use mcp_bridge::upstream::UpstreamConfig;

#[tokio::main]
async fn main() {
    let args = BridgeArgs::parse();
    init_tracing(args.verbose);

    let config = UpstreamConfig::from(&args);

    let code = match bridge::run(config).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "bridge failed");
            eprintln!("mcp-bridge: {e}");
            1
        }
    };

    std::process::exit(code);
}

/// Initialise the tracing subscriber with stderr output.
///
/// Stdout carries the line-delimited JSON-RPC stream, so all diagnostics go
/// to stderr. When `verbose` is true, sets the filter to `debug`; otherwise
/// respects the `RUST_LOG` environment variable (defaulting to no output).
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
