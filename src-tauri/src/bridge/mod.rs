//! Bridge Module - Calling-SDK über die Webview
//!
//! Das Calling-SDK des Anbieters läuft als JavaScript in der Webview.
//! Dieses Modul verwaltet:
//! - SDK-Anfragen an die Webview (Event `sdk:request`)
//! - Offene Anfragen bis zur Antwort (`sdk_settle`)
//! - Teilnehmer-Snapshots aus der Webview (`sdk_snapshot`)
//!

mod channel;
mod protocol;
mod webview;

pub use channel::{BridgeError, RequestSink, SdkBridge, DEFAULT_REQUEST_TIMEOUT};
pub use protocol::*;
pub use webview::{BridgePermissionGate, WebviewCall, WebviewClient, WebviewSdk};
