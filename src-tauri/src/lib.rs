//! Agent Call - Voice-Call mit einem AI-Agenten
//!
//! Eine Voice-Call-Applikation mit:
//! - Backend für Call-Credentials und Agent-Connect (HTTP)
//! - Calling-SDK des Anbieters in der Webview (Medien, Signaling, Teilnehmer)
//! - Parallelem Join + Agent-Connect mit Rollback
//! - Audio-Visualizer für den aktiven Sprecher
//!
//! Ohne Feature `app` baut nur die Kernlogik (kein Tauri, keine Webview).

pub mod backend;
pub mod bridge;
pub mod call_engine;
pub mod config;
pub mod controller;
pub mod visualizer;

#[cfg(feature = "app")]
mod app;

#[cfg(feature = "app")]
pub use app::{run, AppState};
