//! JSON-RPC 2.0 envelope classification and synthesized error responses.
//!
//! The bridge is a transport relay, not a protocol endpoint: it classifies
//! messages only by envelope shape (presence of the `id` key) and treats
//! everything else — method names, params, the `jsonrpc` version field, even
//! the MCP handshake — as opaque payload to be forwarded unchanged. The `id`
//! is kept as a raw [`serde_json::Value`] so it can be echoed back verbatim
//! in synthesized error responses without interpretation.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::FramingError;

/// JSON-RPC 2.0 "Internal error" code, used for upstream transport failures.
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 "Parse error" code, used for unexpected per-message failures.
pub const PARSE_ERROR: i32 = -32700;

/// Classification of an inbound message by envelope shape.
///
/// - `Call`: the `id` key is present (with any value, including `null`) —
///   the peer expects exactly one response line.
/// - `Notification`: no `id` key — the message is forwarded upstream but no
///   response line is ever written.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// Message carries an `id` and expects a response.
    Call {
        /// The raw `id` value, echoed back unchanged in synthesized errors.
        id: Value,
    },
    /// Fire-and-forget message with no `id`.
    Notification,
}

/// A parsed inbound line.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Envelope classification.
    pub kind: MessageKind,
    /// The full parsed payload, forwarded as the HTTP POST body.
    pub payload: Value,
    /// The `method` field if present. Extracted for logging only.
    pub method: Option<String>,
}

/// Parse a single input line into an [`InboundMessage`].
///
/// The line must be a JSON object. Arrays (JSON-RPC batches) and scalars are
/// rejected with [`FramingError::NonObject`]; the relay loop drops them.
///
/// # Errors
///
/// Returns [`FramingError::MalformedJson`] for unparseable input and
/// [`FramingError::NonObject`] for non-object top-level values.
pub fn parse_inbound(line: &str) -> Result<InboundMessage, FramingError> {
    let value: Value = serde_json::from_str(line).map_err(|e| FramingError::MalformedJson {
        reason: e.to_string(),
    })?;

    let obj = value.as_object().ok_or(FramingError::NonObject)?;

    let kind = match obj.get("id") {
        Some(id) => MessageKind::Call { id: id.clone() },
        None => MessageKind::Notification,
    };
    let method = obj.get("method").and_then(|m| m.as_str()).map(String::from);

    Ok(InboundMessage {
        kind,
        payload: value,
        method,
    })
}

/// JSON-RPC 2.0 error object embedded in synthesized responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (standard JSON-RPC 2.0 range).
    pub code: i32,

    /// Human-readable error message.
    pub message: String,

    /// Additional error data (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Build a `-32603` (Internal error) response for a failed upstream call.
///
/// The `id` is the original request's id, echoed unchanged. The failure
/// detail is embedded in the message, matching the wire shape the stdio peer
/// expects from any JSON-RPC endpoint.
pub fn internal_error_response(id: &Value, detail: &str) -> Value {
    let error = JsonRpcError {
        code: INTERNAL_ERROR,
        message: format!("HTTP request failed: {detail}"),
        data: None,
    };
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error,
    })
}

/// Build a `-32700` (Parse error) response with `id: null`.
///
/// Used for unexpected failures while handling a single message where the
/// original id is unavailable. A single bad message must never take down the
/// bridge, so this is the terminal fallback of the per-message error path.
pub fn parse_error_response(detail: &str) -> Value {
    let error = JsonRpcError {
        code: PARSE_ERROR,
        message: format!("Parse error: {detail}"),
        data: None,
    };
    json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": error,
    })
}

/// Serialize a response envelope to a single output line.
///
/// The json value came either from `serde_json` itself or from the envelope
/// builders above, so serialization is infallible in practice; the static
/// fallback guards against pathological values so the peer never observes an
/// empty line.
pub fn to_output_line(response: &Value) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        to_static_fallback_line(&e.to_string())
    })
}

fn to_static_fallback_line(detail: &str) -> String {
    serde_json::to_string(&parse_error_response(detail)).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#.to_string()
    })
}
