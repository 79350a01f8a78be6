//! Regatta mesh wire format — on-wire types for discovery and session framing.
//!
//! These types ARE the protocol between the host and paddler devices on the
//! local link. Every field, every size, every reserved byte is part of the
//! wire format.
//!
//! All types are #[repr(C, packed)] for deterministic layout and use
//! zerocopy derives for safe, allocation-free serialization. There is no
//! unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Role hashes ───────────────────────────────────────────────────────────────

/// Role identifier — BLAKE3 hash of a canonical role name.
/// Distinguishes host and paddler announcements on the shared multicast group.
pub type RoleHash = [u8; 32];

/// Compute a RoleHash from a canonical name.
/// The input byte string is the protocol-level name and must never change.
pub fn role_hash(name: &[u8]) -> RoleHash {
    *blake3::hash(name).as_bytes()
}

pub fn host_hash() -> RoleHash {
    role_hash(b"regatta.host")
}

pub fn paddler_hash() -> RoleHash {
    role_hash(b"regatta.paddler")
}

// ── Announcement ──────────────────────────────────────────────────────────────

/// Broadcast via ff02::1 multicast so nearby devices can find each other.
///
/// The host announces itself so paddlers can connect in; paddlers announce
/// themselves so the host's browse side can invite them. The receiver keys
/// its registry on the display name carried here.
///
/// Wire size: 72 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Announcement {
    /// BLAKE3 hash identifying the announcer's role (host or paddler).
    /// Datagrams with an unknown role hash are silently ignored.
    pub role: RoleHash,

    /// Display name, UTF-8, NUL-padded. Truncated at 32 bytes by the sender.
    pub name: [u8; 32],

    /// Protocol version. A receiver seeing an unknown version drops the datagram.
    pub version: u32,

    /// TCP port accepting session connections.
    pub session_port: u16,

    /// Bit flags. Reserved, must be zero.
    pub flags: u8,

    /// Reserved, must be zero.
    pub reserved: u8,
}

assert_eq_size!(Announcement, [u8; 72]);

/// NUL-pad a display name into a fixed announcement field.
/// Names longer than 32 bytes are truncated on a char boundary.
pub fn encode_name(name: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut end = name.len().min(32);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    out[..end].copy_from_slice(&name.as_bytes()[..end]);
    out
}

/// Recover a display name from its NUL-padded announcement field.
pub fn decode_name(field: &[u8; 32]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(32);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// ── Session framing ───────────────────────────────────────────────────────────

/// Precedes every frame on a TCP session link.
///
/// Wire size: 6 bytes. `length` counts payload bytes only.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct FrameHeader {
    /// Payload length in bytes, not including this header.
    /// Maximum payload: MAX_FRAME. Oversized frames kill the link.
    pub length: u32,

    /// Frame type discriminator — see FrameKind.
    pub kind: u8,

    /// Wire format version. Currently 0x01.
    pub version: u8,
}

assert_eq_size!(FrameHeader, [u8; 6]);

/// Frame type on a session link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// First frame on any link: the paddler's display name (UTF-8 payload).
    Hello = 0x01,
    /// Host accepted the connection. Empty payload.
    Accept = 0x02,
    /// Host rejected the connection (capacity). Empty payload.
    Reject = 0x03,
    /// One JSON motion envelope.
    Motion = 0x04,
    /// Orderly close. Empty payload.
    Bye = 0x05,
}

impl TryFrom<u8> for FrameKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameKind::Hello),
            0x02 => Ok(FrameKind::Accept),
            0x03 => Ok(FrameKind::Reject),
            0x04 => Ok(FrameKind::Motion),
            0x05 => Ok(FrameKind::Bye),
            other => Err(WireError::UnknownFrameKind(other)),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(k: FrameKind) -> u8 {
        k as u8
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Current wire format version.
pub const WIRE_VERSION: u8 = 0x01;

/// IPv6 link-local multicast address for announcements.
pub const MULTICAST_ADDR: &str = "ff02::1";

/// UDP port on which announcements are sent and received.
pub const ANNOUNCE_PORT: u16 = 47810;

/// Announcement interval in seconds.
pub const ANNOUNCE_INTERVAL_SECS: u64 = 2;

/// Discovered-paddler TTL in seconds.
/// Paddlers not heard within this window are dropped from the registry.
pub const PADDLER_TTL_SECS: u64 = 10;

/// Maximum frame payload size in bytes.
/// Motion envelopes are a few hundred bytes; anything near this is hostile.
pub const MAX_FRAME: usize = 65535;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown frame kind: 0x{0:02x}")]
    UnknownFrameKind(u8),

    #[error("unknown wire version: 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("frame length {0} exceeds maximum {}", MAX_FRAME)]
    FrameTooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
