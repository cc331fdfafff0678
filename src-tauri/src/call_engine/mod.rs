//! Call Engine Module - Join-Ablauf und SDK-Schnittstelle
//!
//! Dieses Modul verwaltet:
//! - Die Traits für das externe Calling-SDK
//! - Die Mikrofon-Berechtigung vor jedem Join
//! - Den parallelen Join + Agent-Connect mit Rollback

mod join;
mod orchestrator;
mod permission;
mod sdk;

pub use join::{join_both, Joined};
pub use orchestrator::{
    release, Branch, JoinCallError, JoinOrchestrator, JoinProgress, JoinedSession,
};
pub use permission::{platform_requires_consent, AlwaysGranted, PermissionGate};
pub use sdk::{
    CallSnapshot, CallingSdk, ClientOptions, JoinOptions, Participant, SdkCall, SdkClient,
    SdkError,
};
