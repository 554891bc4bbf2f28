//! The stdio relay loop.
//!
//! Reads one JSON-RPC message per line from stdin, forwards it as an HTTP
//! POST to the configured upstream endpoint, and writes the response back as
//! one line on stdout with an explicit flush. Strictly one message is in
//! flight at a time: the loop does not read the next line until the current
//! exchange has completed and its response (or synthesized error) has been
//! written, so output order always matches input order.
//!
//! Error policy per line:
//! - invalid UTF-8, malformed JSON, non-object payloads, oversized lines →
//!   dropped with a warn log, no output, loop continues
//! - upstream transport failure on a call → synthesized `-32603` response
//!   with the original id
//! - upstream failure on a notification → logged only, nothing written
//!
//! Only a shutdown signal or an IO error on the stdio streams terminates the
//! loop; EOF on stdin terminates it cleanly.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;

use crate::error::{BridgeError, FramingError};
use crate::jsonrpc::{self, MessageKind, parse_inbound};
use crate::upstream::{UpstreamClient, UpstreamConfig};

/// Maximum input line size (10 MB).
///
/// Lines exceeding this limit are rejected before JSON parsing to prevent
/// allocation of oversized `serde_json::Value` trees from crafted input.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

/// Run the bridge over the process's stdin/stdout until EOF or shutdown.
///
/// Builds the pooled upstream client, installs SIGINT/SIGTERM listeners, and
/// enters the relay loop. The client is dropped on every exit path, releasing
/// its connections deterministically.
///
/// # Errors
///
/// Returns [`BridgeError`] on client construction failure or unrecoverable
/// stdio IO errors. Clean EOF and signal-initiated shutdown return `Ok(())`.
pub async fn run(config: UpstreamConfig) -> Result<(), BridgeError> {
    let client = UpstreamClient::new(config)?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    spawn_signal_listeners(shutdown_tx);

    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tracing::info!(url = %client.url(), "bridge started");
    relay_loop(reader, writer, &client, &mut shutdown_rx).await
}

/// Install SIGINT and SIGTERM listeners that flip the shutdown flag.
fn spawn_signal_listeners(shutdown_tx: watch::Sender<bool>) {
    let tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received SIGINT, shutting down");
                let _ = tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGINT");
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("received SIGTERM, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
            }
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Relay messages between a line-delimited reader/writer pair and the
/// upstream HTTP endpoint.
///
/// Separated from [`run`] so integration tests can drive it over in-memory
/// streams. The shutdown receiver is checked (biased) between messages: a
/// signal arriving mid-exchange lets the current exchange complete and its
/// response flush before the loop exits, so the peer never observes partial
/// output.
///
/// # Errors
///
/// Returns [`BridgeError::StdioIo`] on reader/writer IO failure. All
/// per-message failures are handled inside the loop.
pub async fn relay_loop<R, W>(
    mut reader: R,
    mut writer: W,
    client: &UpstreamClient,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<(), BridgeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw_buf = Vec::new();

    loop {
        raw_buf.clear();

        let bytes_read = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                tracing::info!("shutdown signal received, exiting relay loop");
                break;
            }
            result = bounded_read_line(&mut reader, &mut raw_buf, MAX_LINE_BYTES) => {
                match result {
                    Ok(n) => n,
                    Err(FramingError::MessageTooLarge { max_bytes }) => {
                        tracing::warn!(max_bytes, "input line exceeded size limit, skipping");
                        continue;
                    }
                    Err(FramingError::Io(e)) => return Err(BridgeError::StdioIo(e)),
                    // bounded_read_line only produces the two variants above.
                    Err(e) => {
                        tracing::warn!(error = %e, "unexpected framing error, skipping line");
                        continue;
                    }
                }
            }
        };

        // EOF — the stdio peer closed its end.
        if bytes_read == 0 {
            tracing::info!("stdin closed, exiting relay loop");
            break;
        }

        // Strict UTF-8 validation: lossy conversion would silently replace
        // invalid bytes with U+FFFD, corrupting message content.
        let line = match std::str::from_utf8(&raw_buf) {
            Ok(s) => s,
            Err(_) => {
                tracing::warn!(len = raw_buf.len(), "invalid UTF-8 on input line, skipping");
                continue;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let msg = match parse_inbound(trimmed) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable input line, skipping");
                continue;
            }
        };

        let method = msg.method.as_deref().unwrap_or("-");

        match msg.kind {
            MessageKind::Notification => {
                tracing::debug!(method, "forwarding notification");
                // Notifications never produce an output line, including on
                // upstream failure.
                if let Err(e) = client.notify(&msg.payload).await {
                    tracing::warn!(method, error = %e, "notification forward failed");
                }
            }
            MessageKind::Call { id } => {
                tracing::debug!(method, "forwarding call");
                let response = match client.forward(&msg.payload).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(method, error = %e, "upstream call failed, synthesizing error response");
                        jsonrpc::internal_error_response(&id, &e.to_string())
                    }
                };
                write_response_line(&mut writer, &response).await?;
            }
        }
    }

    Ok(())
}

/// Serialize a response envelope and write it as one flushed output line.
async fn write_response_line<W>(writer: &mut W, response: &Value) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = jsonrpc::to_output_line(response);
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(BridgeError::StdioIo)?;
    // Explicit flush so the stdio peer observes the response immediately.
    writer.flush().await.map_err(BridgeError::StdioIo)
}

// ─────────────────────────────────────────────────────────────────────────────
// Bounded Line Reading
// ─────────────────────────────────────────────────────────────────────────────

/// Read a single line from an async buffered reader, enforcing a byte limit.
///
/// Unlike bare `read_line`, this will not allocate unbounded memory if the
/// peer streams bytes without a newline delimiter. If the accumulated bytes
/// exceed `max_bytes` before a newline is found, the remainder of the
/// offending line is drained and `FramingError::MessageTooLarge` is returned,
/// leaving the reader positioned at the start of the next line.
///
/// Raw bytes are accumulated in a `Vec<u8>` so multi-byte UTF-8 sequences
/// that straddle internal buffer boundaries are never corrupted; the caller
/// validates UTF-8 after the full line is assembled.
///
/// # Returns
///
/// - `Ok(n)` with `n > 0`: a complete line (newline included) is in `buf`
/// - `Ok(0)`: EOF
/// - `Err(FramingError::MessageTooLarge)`: line exceeded `max_bytes`
/// - `Err(FramingError::Io)`: underlying IO error
async fn bounded_read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<usize, FramingError> {
    let mut total = 0usize;
    loop {
        let available = reader.fill_buf().await.map_err(FramingError::Io)?;

        // EOF — return what we have (or 0 if nothing).
        if available.is_empty() {
            return Ok(total);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let to_consume = pos + 1;
                if total + to_consume > max_bytes {
                    reader.consume(to_consume);
                    return Err(FramingError::MessageTooLarge { max_bytes });
                }

                buf.extend_from_slice(&available[..to_consume]);
                total += to_consume;
                reader.consume(to_consume);
                return Ok(total);
            }
            None => {
                let len = available.len();
                if total + len > max_bytes {
                    reader.consume(len);
                    drain_until_newline(reader).await;
                    return Err(FramingError::MessageTooLarge { max_bytes });
                }

                buf.extend_from_slice(available);
                total += len;
                reader.consume(len);
            }
        }
    }
}

/// Drain bytes from a reader until a newline or EOF is reached.
///
/// Used after detecting an oversized line to skip the remainder of the
/// offending message. A 30-second timeout prevents hanging on a stalled peer.
async fn drain_until_newline<R: AsyncBufRead + Unpin>(reader: &mut R) {
    let drain = async {
        loop {
            match reader.fill_buf().await {
                Ok([]) => return, // EOF
                Ok(buf) => {
                    if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let consume = pos + 1;
                        reader.consume(consume);
                        return;
                    }
                    let len = buf.len();
                    reader.consume(len);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "IO error while draining oversized line");
                    return;
                }
            }
        }
    };
    if tokio::time::timeout(std::time::Duration::from_secs(30), drain)
        .await
        .is_err()
    {
        tracing::warn!("drain of oversized line timed out after 30s");
    }
}
