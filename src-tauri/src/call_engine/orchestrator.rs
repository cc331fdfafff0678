//! Call Join Orchestrator
//!
//! Verbindet den AI-Agenten und tritt dem Call bei, beides parallel.
//! Ergebnis ist entweder ein Call, dem der Mensch beigetreten ist UND für den
//! das Backend den Agenten angenommen hat, oder nichts. Bei jedem Fehler wird
//! der Call verlassen und der Client getrennt.

use super::join::{join_both, Joined};
use super::permission::PermissionGate;
use super::sdk::{CallingSdk, ClientOptions, JoinOptions, SdkCall, SdkClient, SdkError};
use crate::backend::{BackendClient, BackendError, CallCredentials};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Welcher der beiden parallelen Schritte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    AgentConnect,
    Join,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::AgentConnect => f.write_str("agent connect"),
            Branch::Join => f.write_str("call join"),
        }
    }
}

#[derive(Error, Debug)]
pub enum JoinCallError {
    #[error("Could not fetch call credentials: {0}")]
    CredentialFetch(#[source] BackendError),

    #[error("Invalid credentials: {0}")]
    CredentialInvalid(String),

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Could not connect agent: {0}")]
    AgentConnect(#[source] BackendError),

    #[error("Could not join call: {0}")]
    Join(#[source] SdkError),

    #[error("{branch} timed out after {after:?}")]
    Timeout { branch: Branch, after: Duration },
}

impl JoinCallError {
    /// Ordnet Fehler beim Abholen der Credentials ein
    pub fn from_fetch(err: BackendError) -> Self {
        match err {
            BackendError::InvalidCredentials(e) => Self::CredentialInvalid(e.to_string()),
            other => Self::CredentialFetch(other),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Zwischenstände während des Joins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinProgress {
    /// Backend hat den Agenten angenommen, eigener Join läuft noch
    AgentAccepted,
    /// Eigener Join erfolgreich, Agent-Connect läuft evtl. noch
    Joined,
}

/// Erfolgreich aufgebaute Session: Client + Call
pub struct JoinedSession<S: CallingSdk> {
    pub client: S::Client,
    pub call: S::Call,
    pub joined_at: DateTime<Utc>,
}

impl<S: CallingSdk> fmt::Debug for JoinedSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinedSession")
            .field("call_id", &self.call.call_id().to_string())
            .field("joined_at", &self.joined_at)
            .finish()
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct JoinOrchestrator<S: CallingSdk> {
    sdk: Arc<S>,
    backend: BackendClient,
    permissions: Arc<dyn PermissionGate>,
    timeout: Option<Duration>,
}

impl<S: CallingSdk> JoinOrchestrator<S> {
    pub fn new(sdk: Arc<S>, backend: BackendClient, permissions: Arc<dyn PermissionGate>) -> Self {
        Self {
            sdk,
            backend,
            permissions,
            timeout: None,
        }
    }

    /// Timeout pro Branch (gilt für Agent-Connect und Join gleichermaßen)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Tritt dem Call bei und verbindet den Agenten
    pub async fn join_call(
        &self,
        credentials: CallCredentials,
    ) -> Result<JoinedSession<S>, JoinCallError> {
        self.join_call_observed(credentials, |_| {}).await
    }

    /// Wie [`join_call`](Self::join_call), meldet aber Zwischenstände
    pub async fn join_call_observed<F>(
        &self,
        credentials: CallCredentials,
        observe: F,
    ) -> Result<JoinedSession<S>, JoinCallError>
    where
        F: Fn(JoinProgress) + Send + Sync,
    {
        if !self.permissions.request_microphone().await {
            tracing::warn!("Microphone permission denied, not joining");
            return Err(JoinCallError::PermissionDenied);
        }

        tracing::info!(
            "Joining call {} as '{}'",
            credentials.call_id,
            credentials.user_id
        );

        let client = self
            .sdk
            .create_client(ClientOptions {
                api_key: credentials.api_key,
                user_id: credentials.user_id,
                token: credentials.token,
            })
            .map_err(|e| JoinCallError::CredentialInvalid(e.to_string()))?;

        let call = client.call(&credentials.call_id);

        // Reiner Voice-Call
        if let Err(e) = call.disable_camera().await {
            release(&client, &call).await;
            return Err(JoinCallError::Join(e));
        }

        let observe = &observe;
        let joined = &AtomicBool::new(false);
        let connect = bounded(Branch::AgentConnect, self.timeout, async {
            self.backend
                .connect_agent(call.call_id())
                .await
                .map_err(JoinCallError::AgentConnect)?;
            if !joined.load(Ordering::Acquire) {
                observe(JoinProgress::AgentAccepted);
            }
            Ok::<(), JoinCallError>(())
        });
        let join = bounded(Branch::Join, self.timeout, async {
            call.join(JoinOptions { create: true })
                .await
                .map_err(JoinCallError::Join)?;
            joined.store(true, Ordering::Release);
            observe(JoinProgress::Joined);
            Ok::<(), JoinCallError>(())
        });

        let outcome = join_both(connect, join).await;
        match outcome {
            Joined::AllSucceeded((), ()) => {
                tracing::info!("Joined call {} with agent", call.call_id());
                Ok(JoinedSession {
                    client,
                    call,
                    joined_at: Utc::now(),
                })
            }
            Joined::FirstFailure(err) => {
                tracing::error!("Joining call {} failed: {}", call.call_id(), err);
                release(&client, &call).await;
                Err(err)
            }
        }
    }
}

/// Verlässt den Call und trennt den Client. Fehler werden nur geloggt.
pub async fn release<C: SdkClient>(client: &C, call: &C::Call) {
    if let Err(e) = call.leave().await {
        tracing::warn!("Cleanup: leaving call {} failed: {}", call.call_id(), e);
    }
    if let Err(e) = client.disconnect_user().await {
        tracing::warn!("Cleanup: disconnecting client failed: {}", e);
    }
}

/// Begrenzt einen Branch zeitlich. Nach Ablauf zählt er als fehlgeschlagen,
/// läuft aber bis zu seinem Ende weiter, damit das Aufräumen erst danach
/// beginnt.
async fn bounded<T, F>(branch: Branch, limit: Option<Duration>, fut: F) -> Result<T, JoinCallError>
where
    F: Future<Output = Result<T, JoinCallError>>,
{
    let Some(after) = limit else {
        return fut.await;
    };

    tokio::pin!(fut);
    match tokio::time::timeout(after, &mut fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} timed out after {:?}, waiting for it to settle", branch, after);
            if let Err(e) = fut.await {
                tracing::debug!("Timed out {} settled with: {}", branch, e);
            }
            Err(JoinCallError::Timeout { branch, after })
        }
    }
}

impl<S: CallingSdk> fmt::Debug for JoinOrchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOrchestrator")
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .finish()
    }
}
