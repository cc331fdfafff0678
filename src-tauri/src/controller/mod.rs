//! Controller Module - UI-Status und Session-Verwaltung
//!
//! Dieses Modul verwaltet:
//! - Den UI-Status als geschlossene State Machine
//! - Die Session (Client + Call) solange ein Call läuft
//! - Events für das Frontend (Status, Join-Fehler, Sprecher-Pegel)
//!

mod call;
mod state;

pub use call::{CallController, ControllerError, ControllerEvent, JoinFailure};
pub use state::{transition, UiEvent, UiStatus};
