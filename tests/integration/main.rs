//! Regatta integration test harness.
//!
//! Tests in this crate drive the session core end to end through its
//! public API: a scripted transport stands in for the link-local mesh and
//! a recording sink stands in for the game's vehicle controller, so the
//! full pipeline (peer lifecycle → slot table → envelope decode → swing
//! detection → action sink) runs in-process with no network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use regatta_core::config::SessionConfig;
use regatta_core::motion::{Attitude, MotionSample};
use regatta_core::{Envelope, PlayerMeta, SlotNumber, SwingKind};
use regatta_session::{
    ActionSink, MeshTransport, PeerId, PeerSessionState, SessionManager, TransportError,
};

mod gesture;
mod session;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Every command a manager can issue to its transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartAdvertising,
    StopAdvertising,
    StartBrowsing,
    StopBrowsing,
    Invite(PeerId, Duration),
    Disconnect(PeerId),
    DisconnectAll,
}

/// Transport double: records every command, and can be scripted to fail
/// its start calls.
#[derive(Default)]
pub struct ScriptedTransport {
    pub commands: Mutex<Vec<Command>>,
    pub fail_advertise: Mutex<Option<String>>,
    pub fail_browse: Mutex<Option<String>>,
}

impl ScriptedTransport {
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }
}

impl MeshTransport for ScriptedTransport {
    fn start_advertising(&self) -> Result<(), TransportError> {
        self.record(Command::StartAdvertising);
        match self.fail_advertise.lock().unwrap().clone() {
            Some(message) => Err(TransportError(message)),
            None => Ok(()),
        }
    }

    fn stop_advertising(&self) {
        self.record(Command::StopAdvertising);
    }

    fn start_browsing(&self) -> Result<(), TransportError> {
        self.record(Command::StartBrowsing);
        match self.fail_browse.lock().unwrap().clone() {
            Some(message) => Err(TransportError(message)),
            None => Ok(()),
        }
    }

    fn stop_browsing(&self) {
        self.record(Command::StopBrowsing);
    }

    fn invite(&self, peer: &PeerId, timeout: Duration) {
        self.record(Command::Invite(peer.clone(), timeout));
    }

    fn disconnect(&self, peer: &PeerId) {
        self.record(Command::Disconnect(peer.clone()));
    }

    fn disconnect_all(&self) {
        self.record(Command::DisconnectAll);
    }
}

/// Sink double: records every swing delivery.
#[derive(Default)]
pub struct RecordingSink {
    pub swings: Mutex<Vec<(SlotNumber, SwingKind)>>,
}

impl RecordingSink {
    pub fn swings(&self) -> Vec<(SlotNumber, SwingKind)> {
        self.swings.lock().unwrap().clone()
    }
}

impl ActionSink for RecordingSink {
    fn on_swing(&self, slot: SlotNumber, kind: SwingKind) {
        self.swings.lock().unwrap().push((slot, kind));
    }
}

/// A manager wired to scripted collaborators.
pub fn manager_with(
    max_players: usize,
) -> (Arc<SessionManager>, Arc<ScriptedTransport>, Arc<RecordingSink>) {
    let transport = Arc::new(ScriptedTransport::default());
    let sink = Arc::new(RecordingSink::default());
    let config = SessionConfig {
        max_players,
        invite_timeout_secs: 30,
    };
    let manager = SessionManager::new(&config, transport.clone(), sink.clone());
    (manager, transport, sink)
}

pub fn peer(name: &str) -> PeerId {
    PeerId::new(name)
}

/// Walk a peer through the transport's connect sequence.
pub fn connect(manager: &SessionManager, name: &str) {
    manager.peer_state_changed(peer(name), PeerSessionState::Connecting);
    manager.peer_state_changed(peer(name), PeerSessionState::Connected);
}

pub fn disconnect(manager: &SessionManager, name: &str) {
    manager.peer_state_changed(peer(name), PeerSessionState::Disconnected);
}

/// A sample with the given pitch, acceleration magnitude along x, and
/// rotation rate about x.
pub fn sample(t: f64, pitch: f64, accel: f64, rot_x: f64) -> MotionSample {
    MotionSample {
        accel: [accel, 0.0, 0.0],
        rotation: [rot_x, 0.0, 0.0],
        attitude: Attitude {
            roll: 0.0,
            pitch,
            yaw: 0.0,
        },
        timestamp: t,
    }
}

/// Encoded envelope carrying one sample from a named paddler.
pub fn envelope(name: &str, motion: MotionSample) -> Vec<u8> {
    Envelope {
        player: PlayerMeta {
            name: name.to_string(),
            color: "#FF00FF".to_string(),
            character: String::new(),
        },
        device: format!("{name}'s phone"),
        motion,
    }
    .encode()
}

/// Deliver a motion pattern that classifies as one Fast swing: raised hard
/// at `t0`, snapped down 0.3 s later.
pub fn deliver_fast_pattern(manager: &SessionManager, name: &str, t0: f64) {
    manager.data_received(&peer(name), &envelope(name, sample(t0, 1.0, 2.0, 3.0)));
    manager.data_received(&peer(name), &envelope(name, sample(t0 + 0.3, -0.3, 1.9, 2.6)));
}
