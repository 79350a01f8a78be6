//! Per-slot swing gesture detection.
//!
//! A discrete-time classifier over one paddler's motion stream. The player
//! raises the device (pitch up), then brings it down; the detector watches
//! the whole arc and classifies it as a Fast or Slow swing, or discards it.
//!
//! All timing is computed from sample capture timestamps, including the
//! post-swing cooldown, which is a deadline compared against the next
//! sample rather than a scheduled timer. A fixed sample sequence therefore
//! always produces the same events, and a detector reset has nothing to
//! cancel.

use regatta_core::{MotionSample, SwingKind};

// ── Tuning constants ──────────────────────────────────────────────────────────
// Hand-tuned against real paddling sessions. Exact values, not estimates.

/// Pitch band that counts as "device raised", radians (exclusive bounds).
pub const PITCH_UP_MIN: f64 = 0.4;
pub const PITCH_UP_MAX: f64 = std::f64::consts::FRAC_PI_2;

/// Below this pitch the swing has ended pointing down, radians.
pub const PITCH_DOWN_MAX: f64 = -0.2;

/// Entry triggers: a raised device starts monitoring when either signature
/// fires. Acceleration in g, rotation about x in rad/s.
pub const FAST_ACCEL_TRIGGER: f64 = 1.8;
pub const FAST_ROTATION_TRIGGER: f64 = 2.5;
pub const SLOW_ACCEL_TRIGGER: f64 = 0.25;
pub const SLOW_ROTATION_TRIGGER: f64 = 0.4;

/// Allowed elapsed time from monitoring entry to classification, seconds.
pub const FAST_WINDOW: (f64, f64) = (0.15, 1.0);
pub const SLOW_WINDOW: (f64, f64) = (0.7, 2.5);

/// Minimum downward pitch travel (start pitch − current pitch), radians.
pub const FAST_MIN_PITCH_CHANGE: f64 = 1.0;
pub const SLOW_MIN_PITCH_CHANGE: f64 = 0.9;

/// Monitoring aborts with no event after this long, seconds.
pub const MONITOR_TIMEOUT: f64 = 2.5;

/// Pitch trending back up past the start point by this much cancels the
/// swing — the player repositioned without following through.
pub const REVERSAL_ABORT: f64 = -0.35;

/// No new swing may start within this window after a detection, seconds.
pub const COOLDOWN_SECS: f64 = 1.0;

// ── Detector ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    Monitoring {
        start_pitch: f64,
        start_ts: f64,
        max_accel: f64,
        max_rot_x: f64,
    },
}

/// Streaming swing classifier. One per slot, owned by it, reset on unbind.
#[derive(Debug)]
pub struct SwingGestureDetector {
    state: State,
    /// Cooldown deadline in sample-timestamp seconds. While set and in the
    /// future, samples do not advance the state machine.
    cooldown_until: Option<f64>,
}

impl Default for SwingGestureDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SwingGestureDetector {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            cooldown_until: None,
        }
    }

    /// Back to the initial state. Clears any pending cooldown deadline.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.cooldown_until = None;
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle && self.cooldown_until.is_none()
    }

    /// Feed one sample. Returns a classification for at most one swing.
    ///
    /// The caller refreshes latest-sample telemetry regardless of the
    /// return value; a sample arriving during cooldown reaches telemetry
    /// but never the state machine.
    pub fn observe(&mut self, sample: &MotionSample) -> Option<SwingKind> {
        let t = sample.timestamp;

        if let Some(deadline) = self.cooldown_until {
            if t < deadline {
                return None;
            }
            self.cooldown_until = None;
        }

        match self.state {
            State::Idle => {
                self.try_start_monitoring(sample);
                None
            }
            State::Monitoring {
                start_pitch,
                start_ts,
                max_accel,
                max_rot_x,
            } => {
                let max_accel = max_accel.max(sample.accel_magnitude());
                let max_rot_x = max_rot_x.max(sample.rotation[0].abs());

                let elapsed = t - start_ts;
                if elapsed > MONITOR_TIMEOUT {
                    tracing::trace!(elapsed, "monitoring timed out");
                    self.state = State::Idle;
                    return None;
                }

                let pitch = sample.pitch();
                let pitch_change = start_pitch - pitch;
                let ended_down = pitch < PITCH_DOWN_MAX;

                // Fast first: a hard swing also clears every Slow threshold,
                // and must not be classified as the looser kind.
                let fast = elapsed >= FAST_WINDOW.0
                    && elapsed <= FAST_WINDOW.1
                    && pitch_change >= FAST_MIN_PITCH_CHANGE
                    && ended_down
                    && max_accel >= FAST_ACCEL_TRIGGER
                    && max_rot_x >= FAST_ROTATION_TRIGGER;

                let slow = !fast
                    && elapsed >= SLOW_WINDOW.0
                    && elapsed <= SLOW_WINDOW.1
                    && pitch_change >= SLOW_MIN_PITCH_CHANGE
                    && ended_down
                    && (max_accel > SLOW_ACCEL_TRIGGER || max_rot_x > SLOW_ROTATION_TRIGGER);

                if fast || slow {
                    let kind = if fast { SwingKind::Fast } else { SwingKind::Slow };
                    tracing::debug!(?kind, elapsed, pitch_change, "swing classified");
                    self.state = State::Idle;
                    self.cooldown_until = Some(t + COOLDOWN_SECS);
                    return Some(kind);
                }

                if pitch_change < REVERSAL_ABORT {
                    // False start: raised again before any downswing.
                    tracing::trace!(pitch_change, "swing aborted on pitch reversal");
                    self.state = State::Idle;
                    return None;
                }

                self.state = State::Monitoring {
                    start_pitch,
                    start_ts,
                    max_accel,
                    max_rot_x,
                };
                None
            }
        }
    }

    fn try_start_monitoring(&mut self, sample: &MotionSample) {
        let pitch = sample.pitch();
        if pitch <= PITCH_UP_MIN || pitch >= PITCH_UP_MAX {
            return;
        }

        let accel = sample.accel_magnitude();
        let rot_x = sample.rotation[0].abs();
        let fast_trigger = accel > FAST_ACCEL_TRIGGER || rot_x > FAST_ROTATION_TRIGGER;
        let slow_trigger = accel > SLOW_ACCEL_TRIGGER || rot_x > SLOW_ROTATION_TRIGGER;
        if !(fast_trigger || slow_trigger) {
            return;
        }

        tracing::trace!(pitch, accel, rot_x, "monitoring started");
        self.state = State::Monitoring {
            start_pitch: pitch,
            start_ts: sample.timestamp,
            max_accel: accel,
            max_rot_x: rot_x,
        };
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
