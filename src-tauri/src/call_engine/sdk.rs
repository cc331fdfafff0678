//! Calling-SDK Schnittstelle
//!
//! Medien, Signaling und Teilnehmer-Zustand liegen im externen SDK.
//! Die App spricht es nur über diese Traits an.

use crate::backend::CallId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::watch;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("Invalid client options: {0}")]
    InvalidOptions(String),

    #[error("SDK operation '{op}' failed: {message}")]
    Operation { op: String, message: String },

    #[error("SDK not available: {0}")]
    Unavailable(String),
}

impl SdkError {
    pub fn operation(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            op: op.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Optionen für den Client-Aufbau (`{apiKey, user: {id}, token}`)
#[derive(Clone)]
pub struct ClientOptions {
    pub api_key: String,
    pub user_id: String,
    pub token: String,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Optionen für `join`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOptions {
    /// Call anlegen falls er noch nicht existiert
    pub create: bool,
}

/// Ein Teilnehmer wie ihn das SDK meldet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    /// Normalisierter Pegel, kann fehlen
    #[serde(default)]
    pub audio_level: Option<f32>,
    #[serde(default)]
    pub is_dominant_speaker: bool,
}

/// Zustand eines Calls zu einem Zeitpunkt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSnapshot {
    pub participants: Vec<Participant>,
    /// Call wurde beendet (lokal oder remote)
    pub ended: bool,
}

// ============================================================================
// TRAITS
// ============================================================================

/// Einstiegspunkt ins SDK: baut authentifizierte Clients
pub trait CallingSdk: Send + Sync + 'static {
    type Client: SdkClient<Call = Self::Call>;
    type Call: SdkCall;

    /// Rein lokaler Aufbau, schlägt nur bei unbrauchbaren Optionen fehl
    fn create_client(&self, options: ClientOptions) -> Result<Self::Client, SdkError>;
}

/// Eine authentifizierte Verbindung zum Calling-Backend
#[async_trait]
pub trait SdkClient: Send + Sync + 'static {
    type Call: SdkCall;

    /// Handle für genau einen Call
    fn call(&self, call_id: &CallId) -> Self::Call;

    /// Trennt die Verbindung. Muss auch ohne vorherigen Join funktionieren.
    async fn disconnect_user(&self) -> Result<(), SdkError>;
}

/// Handle für genau eine Call-Session
#[async_trait]
pub trait SdkCall: Send + Sync + 'static {
    fn call_id(&self) -> &CallId;

    async fn disable_camera(&self) -> Result<(), SdkError>;

    async fn join(&self, options: JoinOptions) -> Result<(), SdkError>;

    /// Verlässt den Call. Muss auch ohne vorherigen Join funktionieren.
    async fn leave(&self) -> Result<(), SdkError>;

    /// Beendet den Call für alle Teilnehmer
    async fn end_call(&self) -> Result<(), SdkError>;

    /// Teilnehmer-Snapshots (aktueller Wert + Änderungen)
    fn subscribe(&self) -> watch::Receiver<CallSnapshot>;
}
