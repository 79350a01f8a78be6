//! Inbound wire envelope — one decoded message from a paddler device.
//!
//! The envelope is JSON on the wire: player display metadata, the sending
//! device's label, and exactly one motion sample. No batching. Decoding is
//! a pure transform; a malformed envelope is dropped by the caller without
//! touching the connection.

use serde::{Deserialize, Serialize};

use crate::motion::MotionSample;

/// Player display metadata carried in every envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMeta {
    pub name: String,
    /// Color tag as a hex string, e.g. "#FF0000".
    pub color: String,
    /// Chosen game character. Optional — older paddler builds omit it.
    #[serde(default)]
    pub character: String,
}

/// One inbound message: sender metadata plus a single motion sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub player: PlayerMeta,
    /// Sending device label, e.g. "iPhone 15".
    pub device: String,
    pub motion: MotionSample,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Envelope {
    /// Decode one envelope from raw message bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize for transmission. Used by the paddler side and tests.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("envelope serialization failed")
    }
}
