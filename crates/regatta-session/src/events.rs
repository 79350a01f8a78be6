//! Session events pushed to UI/telemetry consumers.
//!
//! Replaces the source's published-property pattern: the core emits an
//! event after each observable state mutation and consumers subscribe over
//! a broadcast channel. The core has no UI dependency; a consumer that
//! falls behind loses old events, never blocks the session.

use regatta_core::SwingEvent;

use crate::slots::SlotSnapshot;
use crate::transport::DiscoveryError;

/// Broadcast channel capacity. Slot telemetry updates on every inbound
/// sample, so slow consumers are expected to lag and resubscribe.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Hosting was started or stopped.
    HostingChanged(bool),

    /// A slot's binding, metadata, or telemetry changed.
    SlotChanged(SlotSnapshot),

    /// A swing was detected and delivered to the action sink.
    Swing(SwingEvent),

    /// The advertiser or browser failed. Persistent until the operator
    /// restarts hosting.
    DiscoveryFailed(DiscoveryError),
}
