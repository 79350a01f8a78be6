//! The mesh transport seam.
//!
//! The session core never talks to sockets. It drives an implementation of
//! [`MeshTransport`] (advertise/browse/invite/disconnect) and consumes
//! [`MeshEvent`]s the transport produces. The daemon pumps events into the
//! manager from a single task, which serializes all slot mutations.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Identity of a paddler device, as announced on the mesh.
///
/// Display-name based: the mesh guarantees per-link uniqueness the same way
/// the original peer layer did. Identities are compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection state of a peer as reported by the transport.
/// Mirrors the transport's own session callbacks; the core never invents
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSessionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Which half of discovery failed to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryErrorKind {
    Advertise,
    Browse,
}

/// A discovery failure, surfaced to the operator as a persistent flag.
/// Not retried automatically — hosting must be restarted explicitly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind:?} failed: {message}")]
pub struct DiscoveryError {
    pub kind: DiscoveryErrorKind,
    pub message: String,
}

/// Error starting a transport operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Outbound commands the session manager issues to the transport.
///
/// Intentionally minimal — one session, fixed peer cap, no queueing.
/// Start methods fail synchronously for local errors (e.g. bind failures);
/// asynchronous failures arrive as [`MeshEvent::DiscoveryError`].
pub trait MeshTransport: Send + Sync {
    fn start_advertising(&self) -> Result<(), TransportError>;
    fn stop_advertising(&self);

    fn start_browsing(&self) -> Result<(), TransportError>;
    fn stop_browsing(&self);

    /// Invite a discovered paddler with a bounded timeout. Outcome arrives
    /// as a `StateChanged` event (or nothing, if the invite times out).
    fn invite(&self, peer: &PeerId, timeout: Duration);

    /// Forcibly tear down one peer's connection.
    fn disconnect(&self, peer: &PeerId);

    /// Forcibly tear down every connection.
    fn disconnect_all(&self);
}

/// Inbound events the transport delivers to the session manager.
#[derive(Debug)]
pub enum MeshEvent {
    /// Browse side: a paddler announcement was seen.
    Discovered(PeerId),

    /// Browse side: a previously seen paddler stopped announcing.
    /// Visibility only — connection state changes arrive separately.
    Lost(PeerId),

    /// A paddler asked to join. The responder carries the accept decision
    /// back to the transport; dropping it counts as a rejection.
    ConnectionRequest {
        peer: PeerId,
        respond: oneshot::Sender<bool>,
    },

    /// A peer's connection state changed.
    StateChanged {
        peer: PeerId,
        state: PeerSessionState,
    },

    /// One raw message from a connected peer.
    Data { peer: PeerId, bytes: Bytes },

    /// The advertiser or browser failed after starting.
    DiscoveryError(DiscoveryError),
}
