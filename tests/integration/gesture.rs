use crate::*;

use regatta_core::SwingKind;
use regatta_session::{ConnectionState, SessionEvent};

/// Full pipeline: bytes in from the transport, one Fast swing out to the
/// action sink, slot telemetry updated.
#[test]
fn fast_swing_flows_from_bytes_to_sink() {
    let (manager, _transport, sink) = manager_with(4);
    connect(&manager, "a");

    deliver_fast_pattern(&manager, "a", 0.0);

    assert_eq!(sink.swings(), vec![(1, SwingKind::Fast)]);
    let slot = &manager.snapshot()[0];
    assert_eq!(slot.swing_count, 1);
    assert_eq!(slot.last_sample.unwrap().timestamp, 0.3);
}

/// A gentle sweep classifies as Slow through the same pipeline.
#[test]
fn slow_swing_flows_from_bytes_to_sink() {
    let (manager, _transport, sink) = manager_with(4);
    connect(&manager, "a");

    // pitch falls linearly from 0.8 to −0.3 over 1.2 s at 10 Hz
    for i in 0..=12 {
        let t = i as f64 * 0.1;
        let motion = sample(t, 0.8 - (1.1 / 1.2) * t, 0.3, 0.0);
        manager.data_received(&peer("a"), &envelope("a", motion));
    }

    assert_eq!(sink.swings(), vec![(1, SwingKind::Slow)]);
}

/// Scenario E end to end: a second qualifying pattern inside the cooldown
/// is suppressed; a third after it produces the second event.
#[test]
fn cooldown_suppresses_swings_end_to_end() {
    let (manager, _transport, sink) = manager_with(4);
    connect(&manager, "a");

    deliver_fast_pattern(&manager, "a", 0.0); // event at t=0.3
    deliver_fast_pattern(&manager, "a", 0.5); // inside the 1.0 s cooldown
    deliver_fast_pattern(&manager, "a", 1.5); // past it

    assert_eq!(
        sink.swings(),
        vec![(1, SwingKind::Fast), (1, SwingKind::Fast)]
    );
    assert_eq!(manager.snapshot()[0].swing_count, 2);
}

/// Samples arriving during cooldown still refresh telemetry.
#[test]
fn cooldown_samples_still_update_telemetry() {
    let (manager, _transport, sink) = manager_with(4);
    connect(&manager, "a");

    deliver_fast_pattern(&manager, "a", 0.0);
    manager.data_received(&peer("a"), &envelope("a", sample(0.6, 0.2, 0.1, 0.0)));

    assert_eq!(sink.swings().len(), 1);
    let slot = &manager.snapshot()[0];
    assert_eq!(slot.swing_count, 1);
    assert_eq!(slot.last_sample.unwrap().timestamp, 0.6);
}

/// Each connected paddler is classified independently by its own slot's
/// detector.
#[test]
fn swings_are_tracked_per_slot() {
    let (manager, _transport, sink) = manager_with(4);
    connect(&manager, "a");
    connect(&manager, "b");

    deliver_fast_pattern(&manager, "a", 0.0);
    deliver_fast_pattern(&manager, "b", 0.1);
    deliver_fast_pattern(&manager, "a", 2.0);

    assert_eq!(
        sink.swings(),
        vec![(1, SwingKind::Fast), (2, SwingKind::Fast), (1, SwingKind::Fast)]
    );
    assert_eq!(manager.snapshot()[0].swing_count, 2);
    assert_eq!(manager.snapshot()[1].swing_count, 1);
}

/// A malformed envelope is dropped without touching the connection; the
/// stream keeps classifying afterwards.
#[test]
fn malformed_envelope_is_dropped_silently() {
    let (manager, _transport, sink) = manager_with(4);
    connect(&manager, "a");

    manager.data_received(&peer("a"), b"definitely not json");
    assert_eq!(manager.snapshot()[0].state, ConnectionState::Connected);

    deliver_fast_pattern(&manager, "a", 0.0);
    assert_eq!(sink.swings(), vec![(1, SwingKind::Fast)]);
}

/// Samples from a peer without a slot are dropped silently.
#[test]
fn sample_from_unmapped_peer_is_dropped() {
    let (manager, _transport, sink) = manager_with(4);

    manager.data_received(&peer("ghost"), &envelope("ghost", sample(0.0, 1.0, 2.0, 3.0)));

    assert!(sink.swings().is_empty());
    assert!(manager.snapshot().iter().all(|s| s.last_sample.is_none()));
}

/// Envelope metadata is the source of truth for display fields and
/// refreshes on every sample.
#[test]
fn envelope_metadata_refreshes_slot_display() {
    let (manager, _transport, _sink) = manager_with(4);
    connect(&manager, "a");

    // Hand-built JSON, proving the wire schema rather than the encoder.
    let json = serde_json::json!({
        "player": { "name": "Ayu", "color": "#123456", "character": "Koala" },
        "device": "iPhone 15",
        "motion": {
            "accel": [0.0, 0.0, 1.0],
            "rotation": [0.0, 0.0, 0.0],
            "attitude": { "roll": 0.0, "pitch": 0.0, "yaw": 0.0 },
            "timestamp": 1.0
        }
    });
    manager.data_received(&peer("a"), json.to_string().as_bytes());

    let slot = &manager.snapshot()[0];
    assert_eq!(slot.name, "Ayu");
    assert_eq!(slot.color, "#123456");
    assert_eq!(slot.character, "Koala");
    assert_eq!(slot.device, "iPhone 15");
}

/// A reconnected peer starts from a fresh detector and zero swings, even
/// when it lands in its old slot.
#[test]
fn reconnection_resets_detector_and_count() {
    let (manager, _transport, sink) = manager_with(4);
    connect(&manager, "a");
    deliver_fast_pattern(&manager, "a", 0.0);
    assert_eq!(manager.snapshot()[0].swing_count, 1);

    disconnect(&manager, "a");
    connect(&manager, "a");
    assert_eq!(manager.snapshot()[0].swing_count, 0);

    // The old cooldown died with the unbind: a pattern that would have
    // been suppressed classifies immediately.
    deliver_fast_pattern(&manager, "a", 0.5);
    assert_eq!(sink.swings().len(), 2);
    assert_eq!(manager.snapshot()[0].swing_count, 1);
}

/// Session events reach broadcast subscribers: slot changes and swings.
#[test]
fn events_reach_broadcast_subscribers() {
    let (manager, _transport, _sink) = manager_with(4);
    let mut receiver = manager.subscribe();

    connect(&manager, "a");
    deliver_fast_pattern(&manager, "a", 0.0);

    let mut saw_slot_change = false;
    let mut saw_swing = false;
    while let Ok(event) = receiver.try_recv() {
        match event {
            SessionEvent::SlotChanged(snapshot) if snapshot.number == 1 => {
                saw_slot_change = true;
            }
            SessionEvent::Swing(swing) => {
                assert_eq!(swing.slot, 1);
                assert_eq!(swing.kind, SwingKind::Fast);
                assert_eq!(swing.count, 1);
                saw_swing = true;
            }
            _ => {}
        }
    }
    assert!(saw_slot_change);
    assert!(saw_swing);
}
