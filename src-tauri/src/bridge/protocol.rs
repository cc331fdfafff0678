//! Message Types für die Webview-Bridge
//!
//! Rust → Webview: [`SdkRequest`] als Event.
//! Webview → Rust: [`SdkSettlement`] und [`SnapshotUpdate`] als Commands.

use crate::call_engine::Participant;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Event-Name für SDK-Anfragen
pub const SDK_REQUEST_EVENT: &str = "sdk:request";

// ============================================================================
// RUST → WEBVIEW
// ============================================================================

/// SDK-Operationen die die Webview ausführt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkOp {
    CreateClient,
    DisableCamera,
    Join,
    Leave,
    EndCall,
    DisconnectUser,
    RequestMicrophone,
}

impl SdkOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkOp::CreateClient => "create_client",
            SdkOp::DisableCamera => "disable_camera",
            SdkOp::Join => "join",
            SdkOp::Leave => "leave",
            SdkOp::EndCall => "end_call",
            SdkOp::DisconnectUser => "disconnect_user",
            SdkOp::RequestMicrophone => "request_microphone",
        }
    }
}

impl fmt::Display for SdkOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anfrage an die Webview
#[derive(Debug, Clone, Serialize)]
pub struct SdkRequest {
    pub id: Uuid,
    pub op: SdkOp,
    /// `false` = keine Antwort erwartet
    #[serde(rename = "expectsReply")]
    pub expects_reply: bool,
    pub args: Value,
}

// ============================================================================
// WEBVIEW → RUST
// ============================================================================

/// Antwort der Webview auf eine [`SdkRequest`]
#[derive(Debug, Clone, Deserialize)]
pub struct SdkSettlement {
    pub id: Uuid,
    pub ok: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl SdkSettlement {
    pub fn into_result(self) -> Result<Value, String> {
        if self.ok {
            Ok(self.value)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}

/// Teilnehmer-Stand eines Calls, von der Webview gemeldet
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotUpdate {
    pub cid: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub ended: bool,
}

// ============================================================================
// TESTS
// ============================================================================
