//! UI State Machine
//!
//! `start → joining → (awaiting-agent) → joined-with-agent → end`
//!
//! Alle erlaubten Übergänge stehen in [`transition`]. Alles andere wird
//! abgelehnt und lässt den Status unverändert.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// UI STATUS
// ============================================================================

/// Welcher Screen angezeigt wird
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiStatus {
    /// Join-Button
    Start,
    /// Join läuft
    Joining,
    /// Backend hat den Agenten angenommen, Join noch nicht abgeschlossen
    AwaitingAgent,
    /// Im Call mit Agent
    JoinedWithAgent,
    /// Call beendet
    End,
}

impl UiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiStatus::Start => "start",
            UiStatus::Joining => "joining",
            UiStatus::AwaitingAgent => "awaiting-agent",
            UiStatus::JoinedWithAgent => "joined-with-agent",
            UiStatus::End => "end",
        }
    }

    /// "Waiting for agent to join..." Screen
    pub fn is_waiting(&self) -> bool {
        matches!(self, UiStatus::Joining | UiStatus::AwaitingAgent)
    }
}

impl fmt::Display for UiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// UI EVENTS
// ============================================================================

/// Auslöser für Status-Übergänge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiEvent {
    JoinRequested,
    /// Agent-Connect angenommen bevor der Join fertig ist
    AgentObserved,
    JoinSucceeded,
    JoinFailed,
    /// Agent ist als Teilnehmer sichtbar
    AgentVisible,
    HungUp,
    RemoteEnded,
    Dismissed,
}

/// Übergangstabelle. `None` = Übergang nicht erlaubt.
pub fn transition(from: UiStatus, event: UiEvent) -> Option<UiStatus> {
    use UiEvent::*;
    use UiStatus::*;

    match (from, event) {
        (Start | End, JoinRequested) => Some(Joining),
        (Joining, AgentObserved) => Some(AwaitingAgent),
        (Joining | AwaitingAgent, JoinSucceeded) => Some(JoinedWithAgent),
        (Joining | AwaitingAgent, JoinFailed) => Some(Start),
        (AwaitingAgent | JoinedWithAgent, AgentVisible) => Some(JoinedWithAgent),
        (Joining | AwaitingAgent | JoinedWithAgent, HungUp) => Some(Start),
        (JoinedWithAgent, RemoteEnded) => Some(End),
        (End, Dismissed) => Some(Start),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
