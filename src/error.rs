//! Error types for the stdio transport and the bridge process.
//!
//! `FramingError` covers per-line input failures: size limits, malformed
//! JSON, non-object payloads, and IO. None of these are fatal to the relay
//! loop except IO errors on the underlying streams.
//!
//! `BridgeError` covers process-fatal failures: HTTP client construction and
//! irrecoverable stdio IO.

/// Errors that can occur when framing a single line of stdio input.
///
/// Each variant maps to a failure mode in the input pipeline. The relay loop
/// drops the offending line for all variants except [`FramingError::Io`],
/// which terminates the loop.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// A single line exceeds the configured maximum size.
    ///
    /// Checked on raw byte length before JSON parsing to prevent allocation
    /// of oversized `serde_json::Value` trees from crafted input.
    #[error("Message exceeds maximum size of {max_bytes} bytes")]
    MessageTooLarge {
        /// The configured maximum line size in bytes.
        max_bytes: usize,
    },

    /// The line is not valid JSON.
    #[error("Malformed JSON: {reason}")]
    MalformedJson {
        /// Human-readable description of the parse failure.
        reason: String,
    },

    /// The line parses as JSON but the top-level value is not an object.
    ///
    /// Arrays (JSON-RPC batches, unused by MCP) and bare scalars land here.
    #[error("Top-level JSON value is not an object")]
    NonObject,

    /// An underlying IO error occurred while reading from stdin.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-fatal bridge errors.
///
/// Anything that terminates the relay loop other than a clean EOF or an
/// explicit shutdown signal. Mapped to exit code 1 in `main`.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The pooled HTTP client could not be constructed at startup.
    #[error("Failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Human-readable description of the build failure.
        reason: String,
    },

    /// An unrecoverable IO error on stdin or stdout.
    #[error("Stdio IO error: {0}")]
    StdioIo(std::io::Error),
}
