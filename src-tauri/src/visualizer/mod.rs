//! Audio-Level Visualizer
//!
//! - Auswahl des aktiven Sprechers aus den Teilnehmer-Snapshots
//! - Endloser, lazy Frame-Generator für die Balken-Animation

mod frames;
mod speaker;

pub use frames::{clamp_level, frames, ColorMode, Frame, Frames, BAR_COUNT, MIN_BAR};
pub use speaker::{agent_present, select_visual, VisualInput};
