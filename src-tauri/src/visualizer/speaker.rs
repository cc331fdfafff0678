//! Auswahl des aktiven Sprechers
//!
//! Der Visualizer wird nur gezeigt wenn der Agent im Call ist. Spricht der
//! Agent (Dominant Speaker), wird sein Pegel in Blau gezeigt, sonst der Pegel
//! des Menschen in Rot.

use super::frames::{clamp_level, ColorMode};
use crate::call_engine::Participant;
use serde::Serialize;

/// Eingabe für den Frame-Generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualInput {
    pub level: f32,
    pub color: ColorMode,
}

/// Ist der Agent unter den Teilnehmern?
pub fn agent_present(participants: &[Participant], agent_user_id: &str) -> bool {
    participants.iter().any(|p| p.user_id == agent_user_id)
}

pub fn select_visual(participants: &[Participant], agent_user_id: &str) -> Option<VisualInput> {
    let agent = participants.iter().find(|p| p.user_id == agent_user_id)?;

    if agent.is_dominant_speaker {
        return Some(VisualInput {
            level: clamp_level(agent.audio_level),
            color: ColorMode::Blue,
        });
    }

    let human_level = participants
        .iter()
        .find(|p| p.user_id != agent_user_id)
        .and_then(|p| p.audio_level);

    Some(VisualInput {
        level: clamp_level(human_level),
        color: ColorMode::Red,
    })
}

// ============================================================================
// TESTS
// ============================================================================
