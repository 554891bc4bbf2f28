//! Property-based tests for inbound framing and error synthesis.
//!
//! Uses `proptest` to generate arbitrary JSON-RPC 2.0 messages and byte
//! noise, verifying the classification and envelope invariants the relay
//! loop depends on.

use proptest::prelude::*;
use serde_json::{Value, json};

use mcp_bridge::jsonrpc::{
    INTERNAL_ERROR, MessageKind, internal_error_response, parse_inbound,
};

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a JSON-RPC id as (wire form, expected parsed value).
fn arb_jsonrpc_id() -> impl Strategy<Value = (String, Value)> {
    prop_oneof![
        // Numeric id.
        (1i64..=100_000).prop_map(|n| (n.to_string(), json!(n))),
        // String id.
        "[a-zA-Z0-9_-]{1,32}".prop_map(|s| (format!("\"{s}\""), json!(s))),
        // Explicit null id — still a call.
        Just(("null".to_string(), Value::Null)),
    ]
}

/// Generate a valid JSON-RPC method name (alphanumeric + slashes).
fn arb_method() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_/]{0,30}"
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn requests_classify_as_calls((id_wire, id_value) in arb_jsonrpc_id(), method in arb_method()) {
        let line = format!(
            r#"{{"jsonrpc":"2.0","id":{id_wire},"method":"{method}","params":{{}}}}"#
        );
        let msg = parse_inbound(&line).expect("valid request parses");
        prop_assert_eq!(msg.kind, MessageKind::Call { id: id_value });
        prop_assert_eq!(msg.method.as_deref(), Some(method.as_str()));
    }

    #[test]
    fn notifications_classify_without_id(method in arb_method()) {
        let line = format!(r#"{{"jsonrpc":"2.0","method":"{method}"}}"#);
        let msg = parse_inbound(&line).expect("valid notification parses");
        prop_assert_eq!(msg.kind, MessageKind::Notification);
    }

    #[test]
    fn payload_survives_classification((id_wire, _) in arb_jsonrpc_id(), method in arb_method()) {
        let line = format!(r#"{{"jsonrpc":"2.0","id":{id_wire},"method":"{method}"}}"#);
        let msg = parse_inbound(&line).expect("valid request parses");
        // The payload forwarded upstream is exactly what was parsed.
        let reparsed: Value = serde_json::from_str(&line).expect("line is JSON");
        prop_assert_eq!(msg.payload, reparsed);
    }

    #[test]
    fn arbitrary_noise_never_panics(noise in ".*") {
        // Classification either succeeds or returns a framing error; it must
        // never panic regardless of input.
        let _ = parse_inbound(&noise);
    }

    #[test]
    fn arbitrary_bytes_as_lossy_text_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let text = String::from_utf8_lossy(&bytes);
        let _ = parse_inbound(&text);
    }

    #[test]
    fn internal_error_always_echoes_id((_, id_value) in arb_jsonrpc_id(), detail in ".{0,64}") {
        let resp = internal_error_response(&id_value, &detail);
        prop_assert!(resp["jsonrpc"] == "2.0");
        prop_assert_eq!(&resp["id"], &id_value);
        prop_assert!(resp["error"]["code"] == INTERNAL_ERROR);
        // The envelope always serializes to a single line.
        let line = serde_json::to_string(&resp).expect("envelope serializes");
        prop_assert!(!line.contains('\n'));
    }
}
