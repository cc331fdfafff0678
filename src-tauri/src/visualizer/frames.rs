//! Frame-Generator für die Balken-Animation
//!
//! `frames(level, color)` liefert einen unendlichen Iterator. Jeder Aufruf
//! startet die Animation neu bei Frame 0.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::iter::FusedIterator;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Anzahl Balken pro Frame
pub const BAR_COUNT: usize = 5;

/// Mindesthöhe eines Balkens (Stille)
pub const MIN_BAR: f32 = 0.1;

/// Phasen-Fortschritt pro Frame
const PHASE_STEP: f32 = 0.35;

/// Phasen-Versatz zwischen benachbarten Balken
const BAR_OFFSET: f32 = PI / 3.0;

// ============================================================================
// TYPES
// ============================================================================

/// Farbschema: Blau = Agent spricht, Rot = Mensch spricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Blue,
    Red,
}

impl ColorMode {
    pub fn hex(&self) -> &'static str {
        match self {
            ColorMode::Blue => "#3b82f6",
            ColorMode::Red => "#ef4444",
        }
    }
}

/// Ein Animations-Frame, Balkenhöhen in [MIN_BAR, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub index: u64,
    pub color: ColorMode,
    pub bars: Vec<f32>,
}

/// Normalisiert einen Pegel auf [0, 1]. Fehlend oder NaN → 0.
pub fn clamp_level(level: Option<f32>) -> f32 {
    match level {
        Some(level) if level.is_finite() => level.clamp(0.0, 1.0),
        Some(level) if level == f32::INFINITY => 1.0,
        _ => 0.0,
    }
}

/// Startet eine neue Animation
pub fn frames(level: Option<f32>, color: ColorMode) -> Frames {
    Frames {
        level: clamp_level(level),
        color,
        index: 0,
    }
}

// ============================================================================
// FRAMES
// ============================================================================

/// Endloser Frame-Iterator, gibt nie `None` zurück
#[derive(Debug, Clone)]
pub struct Frames {
    level: f32,
    color: ColorMode,
    index: u64,
}

impl Frames {
    /// Übernimmt neuen Pegel/Farbe ohne die Phase zurückzusetzen
    pub fn retarget(&mut self, level: Option<f32>, color: ColorMode) {
        self.level = clamp_level(level);
        self.color = color;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn color(&self) -> ColorMode {
        self.color
    }

    fn render(&self) -> Frame {
        // Wurzel hebt leise Sprache sichtbar an
        let amplitude = self.level.sqrt();
        let phase = self.index as f32 * PHASE_STEP;
        let center = (BAR_COUNT as f32 - 1.0) / 2.0;

        let bars = (0..BAR_COUNT)
            .map(|i| {
                let distance = (i as f32 - center).abs() / (center + 1.0);
                let envelope = 1.0 - 0.5 * distance;
                let wave = ((phase + i as f32 * BAR_OFFSET).sin() + 1.0) / 2.0;
                let height = MIN_BAR + (1.0 - MIN_BAR) * amplitude * envelope * (0.6 + 0.4 * wave);
                height.clamp(MIN_BAR, 1.0)
            })
            .collect();

        Frame {
            index: self.index,
            color: self.color,
            bars,
        }
    }
}

impl Iterator for Frames {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let frame = self.render();
        self.index = self.index.wrapping_add(1);
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for Frames {}

// ============================================================================
// TESTS
// ============================================================================
