//! The player slot table — a fixed pool of seats peers bind into.
//!
//! Slots are pre-allocated at startup and never destroyed; disconnection
//! resets a slot to its initial unbound state, freeing it for any future
//! peer. Binding is tri-state (`Empty | Connecting(peer) | Connected(peer)`)
//! rather than the sentinel-identity scheme the original used, so "free"
//! is an explicit fact, not a magic value.
//!
//! The table is wrapped in one mutex by the session manager; find-free and
//! bind are a single call so two racing connections can never be handed
//! the same slot.

use regatta_core::{Envelope, MotionSample, SlotNumber, SwingEvent};
use serde::Serialize;

use crate::detector::SwingGestureDetector;
use crate::transport::PeerId;

/// Per-slot default color tags, by seat order.
pub const DEFAULT_COLORS: [&str; 4] = ["#FF0000", "#0000FF", "#00FF00", "#FFFF00"];

/// Connection state visible to UI consumers. Derived from the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What occupies a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotBinding {
    Empty,
    /// Reserved while the transport reports the peer as connecting.
    Connecting(PeerId),
    Connected(PeerId),
}

impl SlotBinding {
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            SlotBinding::Empty => None,
            SlotBinding::Connecting(peer) | SlotBinding::Connected(peer) => Some(peer),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self {
            SlotBinding::Empty => ConnectionState::Disconnected,
            SlotBinding::Connecting(_) => ConnectionState::Connecting,
            SlotBinding::Connected(_) => ConnectionState::Connected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("slot {0} is occupied")]
    SlotOccupied(SlotNumber),

    #[error("peer '{0}' is already bound to slot {1}")]
    PeerAlreadyBound(PeerId, SlotNumber),

    #[error("all slots are occupied")]
    TableFull,
}

/// One player seat.
#[derive(Debug)]
pub struct PlayerSlot {
    number: SlotNumber,
    binding: SlotBinding,
    name: String,
    color: String,
    character: String,
    device: String,
    last_sample: Option<MotionSample>,
    swing_count: u32,
    detector: SwingGestureDetector,
}

impl PlayerSlot {
    fn new(number: SlotNumber) -> Self {
        Self {
            number,
            binding: SlotBinding::Empty,
            name: format!("Player {number}"),
            color: DEFAULT_COLORS[(number - 1) % DEFAULT_COLORS.len()].to_string(),
            character: String::new(),
            device: String::new(),
            last_sample: None,
            swing_count: 0,
            detector: SwingGestureDetector::new(),
        }
    }

    /// Back to the pristine startup state. The one and only way a slot is
    /// freed — there is no partial cleanup.
    fn reset(&mut self) {
        *self = PlayerSlot::new(self.number);
    }

    pub fn number(&self) -> SlotNumber {
        self.number
    }

    pub fn binding(&self) -> &SlotBinding {
        &self.binding
    }

    pub fn state(&self) -> ConnectionState {
        self.binding.state()
    }

    pub fn swing_count(&self) -> u32 {
        self.swing_count
    }

    /// Absorb one decoded envelope: refresh display metadata and telemetry,
    /// drive the detector. Returns the swing event if one was classified.
    ///
    /// Metadata refreshes on every sample — paddlers rename themselves and
    /// change colors mid-session and the envelope is the source of truth.
    /// Telemetry updates even while the detector is in cooldown.
    fn ingest(&mut self, envelope: Envelope) -> Option<SwingEvent> {
        self.name = envelope.player.name;
        self.color = envelope.player.color;
        self.character = envelope.player.character;
        self.device = envelope.device;
        self.last_sample = Some(envelope.motion);

        let kind = self.detector.observe(&envelope.motion)?;
        self.swing_count += 1;
        Some(SwingEvent {
            slot: self.number,
            kind,
            count: self.swing_count,
            timestamp: envelope.motion.timestamp,
        })
    }

    fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            number: self.number,
            state: self.state(),
            peer: self.binding.peer().cloned(),
            name: self.name.clone(),
            color: self.color.clone(),
            character: self.character.clone(),
            device: self.device.clone(),
            last_sample: self.last_sample,
            swing_count: self.swing_count,
        }
    }
}

/// Read-only view of one slot, for UI/telemetry consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub number: SlotNumber,
    pub state: ConnectionState,
    pub peer: Option<PeerId>,
    pub name: String,
    pub color: String,
    pub character: String,
    pub device: String,
    pub last_sample: Option<MotionSample>,
    pub swing_count: u32,
}

/// The fixed pool of player slots.
pub struct SlotTable {
    slots: Vec<PlayerSlot>,
}

impl SlotTable {
    /// Pre-allocate `max_players` slots, numbered from 1, all unbound.
    pub fn new(max_players: usize) -> Self {
        Self {
            slots: (1..=max_players).map(PlayerSlot::new).collect(),
        }
    }

    pub fn max_players(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> &PlayerSlot {
        &self.slots[index]
    }

    /// Lowest-numbered free slot, if any.
    pub fn find_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.binding == SlotBinding::Empty)
    }

    pub fn has_free_slot(&self) -> bool {
        self.find_free_slot().is_some()
    }

    pub fn connected_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.binding, SlotBinding::Connected(_)))
            .count()
    }

    /// Index of the slot tracking this peer (connecting or connected).
    pub fn lookup(&self, peer: &PeerId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.binding.peer() == Some(peer))
    }

    /// Index of the slot this peer is connected in. Connecting peers are
    /// not yet eligible to deliver samples.
    pub fn lookup_connected(&self, peer: &PeerId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(&s.binding, SlotBinding::Connected(p) if p == peer))
    }

    /// Reserve the given slot for a connecting peer.
    pub fn reserve(&mut self, index: usize, peer: PeerId) -> Result<(), SlotError> {
        self.check_not_bound_elsewhere(index, &peer)?;
        let slot = &mut self.slots[index];
        if slot.binding != SlotBinding::Empty {
            return Err(SlotError::SlotOccupied(slot.number));
        }
        slot.binding = SlotBinding::Connecting(peer);
        Ok(())
    }

    /// Atomically reserve the lowest free slot. Returns its index.
    pub fn reserve_free(&mut self, peer: PeerId) -> Result<usize, SlotError> {
        let index = self.find_free_slot().ok_or(SlotError::TableFull)?;
        self.reserve(index, peer)?;
        Ok(index)
    }

    /// Bind a peer to the given slot as connected.
    ///
    /// Allowed when the slot is empty or already reserved for this same
    /// peer (promotion). Any other occupant is `SlotOccupied`; a peer
    /// bound elsewhere is `PeerAlreadyBound` — unbind first.
    pub fn bind(&mut self, index: usize, peer: PeerId, device: &str) -> Result<(), SlotError> {
        self.check_not_bound_elsewhere(index, &peer)?;
        let slot = &mut self.slots[index];
        match &slot.binding {
            SlotBinding::Empty => {}
            SlotBinding::Connecting(reserved) if *reserved == peer => {}
            // A repeated Connected report for the same peer is a no-op.
            SlotBinding::Connected(existing) if *existing == peer => return Ok(()),
            _ => return Err(SlotError::SlotOccupied(slot.number)),
        }
        slot.binding = SlotBinding::Connected(peer);
        slot.device = device.to_string();
        Ok(())
    }

    /// Atomically find the lowest free slot and bind into it — one
    /// critical-section entry point so two racing connections can never
    /// both observe the same free slot.
    pub fn bind_free(&mut self, peer: PeerId, device: &str) -> Result<usize, SlotError> {
        let index = self.find_free_slot().ok_or(SlotError::TableFull)?;
        self.bind(index, peer, device)?;
        Ok(index)
    }

    /// Reset a slot to its initial unbound state: default metadata, no
    /// sample, zero swings, detector back to Idle with no cooldown.
    /// Idempotent — unbinding an empty slot is a no-op, not an error.
    pub fn unbind(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if slot.binding == SlotBinding::Empty {
            return;
        }
        slot.reset();
    }

    /// Unbind every slot. Used by full shutdown.
    pub fn unbind_all(&mut self) {
        for index in 0..self.slots.len() {
            self.unbind(index);
        }
    }

    /// Route one decoded envelope to the peer's slot.
    /// Returns `None` for unknown peers (the sample is dropped silently).
    pub fn ingest(&mut self, peer: &PeerId, envelope: Envelope) -> Option<IngestOutcome> {
        let index = self.lookup_connected(peer)?;
        let swing = self.slots[index].ingest(envelope);
        Some(IngestOutcome { index, swing })
    }

    pub fn snapshot_slot(&self, index: usize) -> SlotSnapshot {
        self.slots[index].snapshot()
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots.iter().map(PlayerSlot::snapshot).collect()
    }

    fn check_not_bound_elsewhere(&self, index: usize, peer: &PeerId) -> Result<(), SlotError> {
        if let Some(existing) = self.lookup(peer) {
            if existing != index {
                return Err(SlotError::PeerAlreadyBound(
                    peer.clone(),
                    self.slots[existing].number,
                ));
            }
        }
        Ok(())
    }
}

/// Result of routing one envelope into the table.
pub struct IngestOutcome {
    pub index: usize,
    pub swing: Option<SwingEvent>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
