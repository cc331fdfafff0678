//! Access-Token Payload
//!
//! Das Token hat die Form `<header>.<payload>.<signatur>`. Der Payload ist
//! base64url-kodiertes JSON. Die Signatur wird hier nicht geprüft, das
//! Token dient nur als Quelle für die User-ID.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;

/// Liest `user_id` aus dem Token-Payload.
///
/// Gibt einen leeren String zurück wenn das Token kein Payload-Segment hat,
/// das Segment kein gültiges base64url/JSON ist oder `user_id` fehlt.
pub fn parse_user_id_from_token(token: &str) -> String {
    decode_payload(token)
        .as_ref()
        .and_then(|payload| payload.get("user_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn decode_payload(token: &str) -> Option<Value> {
    let segment = token.split('.').nth(1)?;
    // Padding ist bei JWTs nicht vorgesehen, manche Encoder hängen es trotzdem an
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

// ============================================================================
// TESTS
// ============================================================================
