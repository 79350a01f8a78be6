//! Swing event types — the discrete output of the gesture detector.

use serde::{Deserialize, Serialize};

/// One-based player slot number. Stable for the process lifetime.
pub type SlotNumber = usize;

/// Classification of a detected swing.
///
/// A hard smash and a gentle sweep are both valid paddle input but carry
/// incompatible timing and force signatures, so they are separate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    Fast,
    Slow,
}

/// A discrete swing, produced by the detector and consumed once by the
/// action sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingEvent {
    pub slot: SlotNumber,
    pub kind: SwingKind,
    /// Cumulative swing count for this slot at the time of detection.
    pub count: u32,
    /// Capture timestamp of the classifying sample, seconds.
    pub timestamp: f64,
}
