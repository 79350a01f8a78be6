//! The link-local mesh transport.
//!
//! Concrete implementation of the session core's `MeshTransport` seam for
//! an IPv6 link-local network: multicast announcements for discovery, one
//! TCP connection per paddler for the session stream.

pub mod announce;
pub mod discover;
pub mod link;

pub use link::LinkLocalMesh;
