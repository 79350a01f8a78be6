//! regatta-session — player slot table, swing gesture detection, and the
//! session manager that bridges the mesh transport into both.
//!
//! The transport and the action sink are collaborator seams: this crate
//! defines the traits and event types, the daemon provides the concrete
//! link-local mesh and the game-side sink.

pub mod detector;
pub mod events;
pub mod manager;
pub mod sink;
pub mod slots;
pub mod transport;

pub use detector::SwingGestureDetector;
pub use events::SessionEvent;
pub use manager::SessionManager;
pub use sink::{ActionSink, NullSink};
pub use slots::{ConnectionState, SlotError, SlotSnapshot, SlotTable};
pub use transport::{
    DiscoveryError, DiscoveryErrorKind, MeshEvent, MeshTransport, PeerId, PeerSessionState,
    TransportError,
};
