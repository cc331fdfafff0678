//! HTTP Client für das Agent-Backend
//!
//! Zwei Routen:
//! - `GET  {base}/credentials`         → Call-Credentials
//! - `POST {base}/{type}/{id}/connect` → AI-Agent tritt dem Call bei
//!
//! Kein Retry. Der Aufrufer entscheidet ob er es erneut versucht.

use super::messages::*;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Obergrenze pro Backend-Request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request to backend failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not fetch call credentials (status {status})")]
    CredentialFetch { status: u16 },

    #[error("Could not connect agent (status {status})")]
    AgentConnect { status: u16 },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(#[from] CredentialError),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

// ============================================================================
// BACKEND CLIENT
// ============================================================================

/// HTTP Client für Credentials und Agent-Connect
#[derive(Clone)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    /// Erstellt einen neuen BackendClient
    pub fn new(base_url: Url) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self::with_http_client(base_url, http)
    }

    /// Erstellt einen BackendClient mit eigenem reqwest::Client
    pub fn with_http_client(base_url: Url, http: reqwest::Client) -> Self {
        Self { base_url, http }
    }

    /// Gibt die Basis-URL zurück
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Holt frische Call-Credentials vom Backend
    pub async fn fetch_call_credentials(&self) -> Result<CallCredentials, BackendError> {
        let url = self.endpoint(&["credentials"])?;
        tracing::debug!("Fetching call credentials from {}", url);

        let response = self.http.get(url).send().await?;

        if response.status() != StatusCode::OK {
            tracing::warn!("Credential fetch rejected: {}", response.status());
            return Err(BackendError::CredentialFetch {
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let decoded: CredentialsResponse =
            serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))?;

        let credentials = decoded.into_credentials()?;
        tracing::info!(
            "Fetched credentials for user '{}' in call {}",
            credentials.user_id,
            credentials.call_id
        );

        Ok(credentials)
    }

    /// Bittet das Backend, den AI-Agenten mit dem Call zu verbinden
    pub async fn connect_agent(&self, call_id: &CallId) -> Result<(), BackendError> {
        let url = self.endpoint(&[call_id.call_type(), call_id.id(), "connect"])?;
        tracing::debug!("Requesting agent for call {} via {}", call_id, url);

        let response = self.http.post(url).send().await?;

        if response.status() != StatusCode::OK {
            tracing::warn!("Agent connect for {} rejected: {}", call_id, response.status());
            return Err(BackendError::AgentConnect {
                status: response.status().as_u16(),
            });
        }

        tracing::info!("Agent connect accepted for call {}", call_id);
        Ok(())
    }

    /// Baut eine Route unterhalb der Basis-URL. Segmente werden kodiert.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
