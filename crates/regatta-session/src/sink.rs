//! The action sink seam — where swing events leave the core.

use regatta_core::{SlotNumber, SwingKind};

/// Consumer of detected swings (the game's vehicle controller).
///
/// Called at most once per detected swing, after the slot table lock is
/// released — never reentrant for the same slot while its handler runs.
/// Injected by reference; the core never owns the game side.
pub trait ActionSink: Send + Sync {
    fn on_swing(&self, slot: SlotNumber, kind: SwingKind);
}

/// Sink that discards everything. For headless operation and tests.
pub struct NullSink;

impl ActionSink for NullSink {
    fn on_swing(&self, _slot: SlotNumber, _kind: SwingKind) {}
}
