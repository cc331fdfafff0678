//! Call Controller
//!
//! Steuert den Ablauf Credentials → Berechtigung → Join und hält die
//! Session (Client + Call) solange der Call läuft. Eine Session existiert
//! nur im Status `joined-with-agent`. Jeder fehlgeschlagene Join endet in
//! `start` ohne gespeicherte Handles.
//!
//! Jeder Join-Versuch bekommt eine Generation. Auflegen und Remote-Ende
//! erhöhen sie ebenfalls, ein Ergebnis mit veralteter Generation wird
//! verworfen und seine Session freigegeben.

use super::state::{transition, UiEvent, UiStatus};
use crate::call_engine::{
    release, CallSnapshot, CallingSdk, JoinCallError, JoinOrchestrator, JoinProgress,
    JoinedSession, SdkCall, SdkClient,
};
use crate::config::AppConfig;
use crate::visualizer::{select_visual, VisualInput};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Cannot handle {event:?} while in state '{from}'")]
    InvalidTransition { from: UiStatus, event: UiEvent },

    #[error(transparent)]
    Join(#[from] JoinCallError),

    #[error("Join attempt was abandoned")]
    Abandoned,
}

// ============================================================================
// EVENTS
// ============================================================================

/// Grund eines fehlgeschlagenen Joins (für die Fehlermeldung im UI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinFailure {
    PermissionDenied,
    CredentialFetch,
    CredentialInvalid,
    AgentConnect,
    Join,
    Timeout,
}

impl From<&JoinCallError> for JoinFailure {
    fn from(err: &JoinCallError) -> Self {
        match err {
            JoinCallError::PermissionDenied => JoinFailure::PermissionDenied,
            JoinCallError::CredentialFetch(_) => JoinFailure::CredentialFetch,
            JoinCallError::CredentialInvalid(_) => JoinFailure::CredentialInvalid,
            JoinCallError::AgentConnect(_) => JoinFailure::AgentConnect,
            JoinCallError::Join(_) => JoinFailure::Join,
            JoinCallError::Timeout { .. } => JoinFailure::Timeout,
        }
    }
}

/// Events die vom CallController ausgelöst werden
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    StatusChanged { status: UiStatus },
    JoinFailed { reason: JoinFailure, message: String },
    /// `None` = kein Visualizer (Agent nicht im Call / Call vorbei)
    Speaker { visual: Option<VisualInput> },
}

// ============================================================================
// CALL CONTROLLER
// ============================================================================

struct Slot<S: CallingSdk> {
    status: UiStatus,
    session: Option<JoinedSession<S>>,
    /// Aktueller Join-Versuch
    generation: u64,
}

pub struct CallController<S: CallingSdk> {
    orchestrator: JoinOrchestrator<S>,
    agent_user_id: String,
    end_call_on_hang_up: bool,
    slot: Mutex<Slot<S>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl<S: CallingSdk> CallController<S> {
    /// Erstellt einen neuen CallController im Status `start`
    pub fn new(orchestrator: JoinOrchestrator<S>, config: &AppConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            orchestrator,
            agent_user_id: config.agent_user_id.clone(),
            end_call_on_hang_up: config.end_call_on_hang_up,
            slot: Mutex::new(Slot {
                status: UiStatus::Start,
                session: None,
                generation: 0,
            }),
            watcher: Mutex::new(None),
            event_tx,
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    /// Gibt den aktuellen UI-Status zurück
    pub fn status(&self) -> UiStatus {
        self.slot.lock().status
    }

    /// Läuft gerade eine Session?
    pub fn has_session(&self) -> bool {
        self.slot.lock().session.is_some()
    }

    /// Call-ID der laufenden Session
    pub fn active_call(&self) -> Option<String> {
        self.slot
            .lock()
            .session
            .as_ref()
            .map(|s| s.call.call_id().to_string())
    }

    /// Startet einen Join: Credentials holen, Berechtigung, Join + Agent
    pub async fn join(self: &Arc<Self>) -> Result<UiStatus, ControllerError> {
        let generation = self.begin_join()?;

        let session = match self.run_join(generation).await {
            Ok(session) => session,
            Err(err) => {
                if self.apply_current(generation, UiEvent::JoinFailed).is_err() {
                    tracing::info!("Abandoned join attempt failed: {}", err);
                    return Err(err.into());
                }
                tracing::error!("Could not join call: {}", err);
                let _ = self.event_tx.send(ControllerEvent::JoinFailed {
                    reason: JoinFailure::from(&err),
                    message: err.to_string(),
                });
                return Err(err.into());
            }
        };

        let snapshots = session.call.subscribe();

        // Status, Session und Watcher gemeinsam setzen
        let rejected = {
            let mut slot = self.slot.lock();
            let next = if slot.generation == generation && slot.session.is_none() {
                transition(slot.status, UiEvent::JoinSucceeded)
            } else {
                None
            };
            match next {
                Some(next) => {
                    slot.status = next;
                    slot.session = Some(session);
                    let handle = self.spawn_watcher(snapshots);
                    if let Some(old) = self.watcher.lock().replace(handle) {
                        old.abort();
                    }
                    None
                }
                None => Some((slot.status, session)),
            }
        };

        if let Some((status, session)) = rejected {
            // z.B. während des Joins aufgelegt
            tracing::info!(
                "Join attempt {} finished in state '{}', releasing session",
                generation,
                status
            );
            release(&session.client, &session.call).await;
            return Err(ControllerError::Abandoned);
        }

        self.publish_status(UiStatus::JoinedWithAgent);
        Ok(UiStatus::JoinedWithAgent)
    }

    /// Legt auf: Call beenden/verlassen, Client trennen, zurück zu `start`
    pub async fn hang_up(&self) -> Result<(), ControllerError> {
        let session = self.take_session(UiEvent::HungUp)?;
        self.stop_watcher();

        if let Some(session) = session {
            tracing::info!("Hanging up call {}", session.call.call_id());
            if self.end_call_on_hang_up {
                if let Err(e) = session.call.end_call().await {
                    tracing::warn!("Cleanup: ending call failed: {}", e);
                }
            }
            release(&session.client, &session.call).await;
        }

        let _ = self.event_tx.send(ControllerEvent::Speaker { visual: None });
        Ok(())
    }

    /// Call wurde remote beendet
    pub async fn remote_ended(&self) -> Result<(), ControllerError> {
        self.stop_watcher();
        self.finish_remote().await
    }

    /// End-Screen schließen
    pub fn dismiss(&self) -> Result<UiStatus, ControllerError> {
        self.apply(UiEvent::Dismissed)
    }

    /// Agent ist als Teilnehmer sichtbar
    pub fn agent_visible(&self) -> Result<UiStatus, ControllerError> {
        self.apply(UiEvent::AgentVisible)
    }

    // ========================================================================
    // PRIVATE METHODS
    // ========================================================================

    async fn run_join(&self, generation: u64) -> Result<JoinedSession<S>, JoinCallError> {
        // Credentials sind Einmal-Credentials, daher pro Versuch neu
        let credentials = self
            .orchestrator
            .backend()
            .fetch_call_credentials()
            .await
            .map_err(JoinCallError::from_fetch)?;

        self.orchestrator
            .join_call_observed(credentials, |progress| {
                if progress == JoinProgress::AgentAccepted {
                    if let Err(e) = self.apply_current(generation, UiEvent::AgentObserved) {
                        tracing::debug!("Ignoring agent progress: {}", e);
                    }
                }
            })
            .await
    }

    async fn finish_remote(&self) -> Result<(), ControllerError> {
        let session = self.take_session(UiEvent::RemoteEnded)?;

        if let Some(session) = session {
            tracing::info!("Call {} ended remotely", session.call.call_id());
            // Call ist schon vorbei, nur noch den Client trennen
            if let Err(e) = session.client.disconnect_user().await {
                tracing::warn!("Cleanup: disconnecting client failed: {}", e);
            }
        }

        let _ = self.event_tx.send(ControllerEvent::Speaker { visual: None });
        Ok(())
    }

    /// Startet einen neuen Join-Versuch und gibt seine Generation zurück
    fn begin_join(&self) -> Result<u64, ControllerError> {
        let generation = {
            let mut slot = self.slot.lock();
            slot.status = transition(slot.status, UiEvent::JoinRequested).ok_or(
                ControllerError::InvalidTransition {
                    from: slot.status,
                    event: UiEvent::JoinRequested,
                },
            )?;
            slot.generation += 1;
            slot.generation
        };

        self.publish_status(UiStatus::Joining);
        Ok(generation)
    }

    /// Übergang + Session herausnehmen in einem Schritt. Beendet den
    /// laufenden Join-Versuch.
    fn take_session(&self, event: UiEvent) -> Result<Option<JoinedSession<S>>, ControllerError> {
        let (next, session) = {
            let mut slot = self.slot.lock();
            let next = transition(slot.status, event).ok_or(ControllerError::InvalidTransition {
                from: slot.status,
                event,
            })?;
            slot.status = next;
            slot.generation += 1;
            (next, slot.session.take())
        };

        self.publish_status(next);
        Ok(session)
    }

    /// Wie `apply`, aber nur solange `generation` der aktuelle Versuch ist
    fn apply_current(&self, generation: u64, event: UiEvent) -> Result<UiStatus, ControllerError> {
        self.apply_if(event, |slot| slot.generation == generation)
    }

    fn apply(&self, event: UiEvent) -> Result<UiStatus, ControllerError> {
        self.apply_if(event, |_| true)
    }

    fn apply_if<F>(&self, event: UiEvent, current: F) -> Result<UiStatus, ControllerError>
    where
        F: FnOnce(&Slot<S>) -> bool,
    {
        let (previous, next) = {
            let mut slot = self.slot.lock();
            if !current(&slot) {
                return Err(ControllerError::Abandoned);
            }
            let previous = slot.status;
            let next = transition(previous, event)
                .ok_or(ControllerError::InvalidTransition { from: previous, event })?;
            slot.status = next;
            (previous, next)
        };

        if previous != next {
            self.publish_status(next);
        }
        Ok(next)
    }

    fn publish_status(&self, status: UiStatus) {
        tracing::debug!("UI status: {}", status);
        let _ = self.event_tx.send(ControllerEvent::StatusChanged { status });
    }

    fn stop_watcher(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
        }
    }

    /// Beobachtet die Teilnehmer: Sprecher-Pegel, Agent sichtbar, Call-Ende
    fn spawn_watcher(self: &Arc<Self>, mut snapshots: watch::Receiver<CallSnapshot>) -> JoinHandle<()> {
        let controller: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut agent_seen = false;

            loop {
                let snapshot = snapshots.borrow_and_update().clone();
                let Some(this) = controller.upgrade() else {
                    break;
                };

                if snapshot.ended {
                    // eigenen Handle lösen statt abbrechen
                    this.watcher.lock().take();
                    if let Err(e) = this.finish_remote().await {
                        tracing::debug!("Remote end ignored: {}", e);
                    }
                    break;
                }

                let visual = select_visual(&snapshot.participants, &this.agent_user_id);
                if visual.is_some() && !agent_seen {
                    agent_seen = true;
                    tracing::info!("Agent '{}' is in the call", this.agent_user_id);
                    if let Err(e) = this.agent_visible() {
                        tracing::debug!("Agent visibility ignored: {}", e);
                    }
                }
                let _ = this.event_tx.send(ControllerEvent::Speaker { visual });
                drop(this);

                if snapshots.changed().await.is_err() {
                    tracing::debug!("Participant stream closed");
                    break;
                }
            }
        })
    }
}

impl<S: CallingSdk> std::fmt::Debug for CallController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallController")
            .field("status", &self.status())
            .field("active_call", &self.active_call())
            .finish()
    }
}
