//! CLI argument types for `mcp-bridge`.
//!
//! Defined separately from `main.rs` so tests can construct and parse them
//! directly.

use std::time::Duration;

use clap::Parser;

use crate::upstream::UpstreamConfig;

/// Stdio-to-HTTP bridge for MCP JSON-RPC servers.
///
/// Reads one JSON-RPC 2.0 message per line on stdin, forwards it to the
/// upstream HTTP endpoint, and writes the response back as one line on
/// stdout. Intended to sit between a stdio MCP client and an HTTP-hosted
/// MCP server.
#[derive(Parser, Debug)]
#[command(name = "mcp-bridge", version)]
pub struct BridgeArgs {
    /// Upstream JSON-RPC endpoint URL.
    #[arg(long, default_value = "http://127.0.0.1:8001/mcp")]
    pub url: String,

    /// Request timeout in seconds for each upstream call.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Connection timeout in seconds (TCP handshake).
    #[arg(long, default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// Enable debug logging on stderr.
    #[arg(long)]
    pub verbose: bool,
}

impl From<&BridgeArgs> for UpstreamConfig {
    fn from(args: &BridgeArgs) -> Self {
        Self {
            url: args.url.clone(),
            timeout: Duration::from_secs(args.timeout_secs),
            connect_timeout: Duration::from_secs(args.connect_timeout_secs),
            ..Self::default()
        }
    }
}
