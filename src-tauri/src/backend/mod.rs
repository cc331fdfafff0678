//! Backend Module - HTTP Client für das Agent-Backend
//!
//! Dieses Modul verwaltet die Kommunikation mit dem Backend:
//! - Call-Credentials abholen (`GET /credentials`)
//! - AI-Agenten in einen Call schicken (`POST /{type}/{id}/connect`)
//! - User-ID aus dem Access-Token ableiten
//!

mod client;
mod messages;
mod token;

pub use client::{BackendClient, BackendError};
pub use messages::*;
pub use token::parse_user_id_from_token;
