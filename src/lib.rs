//! Stdio-to-HTTP bridge for MCP JSON-RPC servers.
//!
//! Exposes a line-delimited JSON-RPC 2.0 transport on stdin/stdout and relays
//! each message to an HTTP-hosted JSON-RPC endpoint, returning the endpoint's
//! response on the same line-delimited channel.

pub mod bridge;
pub mod cli;
pub mod error;
pub mod jsonrpc;
pub mod upstream;
