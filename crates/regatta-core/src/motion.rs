//! Motion sample types.
//!
//! One `MotionSample` per inbound envelope. Samples are immutable values;
//! the newest one replaces the previous everywhere outside the detector's
//! own monitoring window. Magnitudes are derived on demand, never stored.

use serde::{Deserialize, Serialize};

/// Device orientation in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// A single motion-sensor reading from a paddler device.
///
/// Acceleration is in g-units, rotation rate in rad/s, attitude in radians.
/// `timestamp` is the sender's capture clock in seconds — all detector
/// timing (windows, cooldown deadlines) is computed from it, so a fixed
/// sample sequence always classifies the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Acceleration x/y/z in g.
    pub accel: [f64; 3],
    /// Rotation rate x/y/z in rad/s.
    pub rotation: [f64; 3],
    pub attitude: Attitude,
    /// Capture timestamp, seconds.
    pub timestamp: f64,
}

impl MotionSample {
    /// Euclidean magnitude of the acceleration vector, in g.
    pub fn accel_magnitude(&self) -> f64 {
        let [x, y, z] = self.accel;
        (x * x + y * y + z * z).sqrt()
    }

    /// Euclidean magnitude of the rotation-rate vector, in rad/s.
    pub fn rotation_magnitude(&self) -> f64 {
        let [x, y, z] = self.rotation;
        (x * x + y * y + z * z).sqrt()
    }

    pub fn pitch(&self) -> f64 {
        self.attitude.pitch
    }
}
