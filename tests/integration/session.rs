use crate::*;

use std::time::Duration;

use regatta_session::{ConnectionState, DiscoveryErrorKind, PeerSessionState};

/// No sequence of connects and disconnects may leave one peer in two
/// slots or two peers in one slot.
#[test]
fn slot_exclusivity_across_connect_disconnect_sequences() {
    let (manager, _transport, _sink) = manager_with(4);

    connect(&manager, "a");
    connect(&manager, "b");
    connect(&manager, "c");
    disconnect(&manager, "b");
    connect(&manager, "d");
    disconnect(&manager, "a");
    connect(&manager, "b");

    let snapshot = manager.snapshot();
    let mut bound: Vec<String> = snapshot
        .iter()
        .filter_map(|s| s.peer.as_ref().map(|p| p.as_str().to_string()))
        .collect();
    bound.sort();
    let mut deduped = bound.clone();
    deduped.dedup();
    assert_eq!(bound, deduped, "a peer appears in two slots: {snapshot:?}");
    assert_eq!(bound, vec!["b", "c", "d"]);
}

/// The count of connected slots never exceeds the cap, and the fifth
/// connection attempt is rejected while the table is full.
#[test]
fn fifth_connection_is_rejected_at_capacity() {
    let (manager, _transport, _sink) = manager_with(4);

    for name in ["a", "b", "c", "d"] {
        assert!(manager.approve_connection(&peer(name)));
        connect(&manager, name);
    }

    let connected = manager
        .snapshot()
        .iter()
        .filter(|s| s.state == ConnectionState::Connected)
        .count();
    assert_eq!(connected, 4);

    assert!(!manager.approve_connection(&peer("e")));

    // A slot frees and the same request is welcome again.
    disconnect(&manager, "c");
    assert!(manager.approve_connection(&peer("e")));
}

/// A peer that reaches Connected despite a full table (two connects raced
/// past the accept check) is forcibly torn down, not left orphaned.
#[test]
fn connected_with_full_table_is_torn_down() {
    let (manager, transport, _sink) = manager_with(2);

    connect(&manager, "a");
    connect(&manager, "b");
    manager.peer_state_changed(peer("c"), PeerSessionState::Connected);

    assert!(transport
        .commands()
        .contains(&Command::Disconnect(peer("c"))));
    // No slot picked up the peer.
    assert!(manager.snapshot().iter().all(|s| s.peer != Some(peer("c"))));
}

/// A reconnecting peer takes the lowest free slot, which may differ from
/// its original one.
#[test]
fn reconnection_takes_lowest_free_slot() {
    let (manager, _transport, _sink) = manager_with(4);

    connect(&manager, "a"); // slot 1
    connect(&manager, "b"); // slot 2
    connect(&manager, "c"); // slot 3

    disconnect(&manager, "a");
    connect(&manager, "d"); // takes freed slot 1

    connect(&manager, "a"); // next free is slot 4

    let snapshot = manager.snapshot();
    assert_eq!(snapshot[0].peer, Some(peer("d")));
    assert_eq!(snapshot[1].peer, Some(peer("b")));
    assert_eq!(snapshot[2].peer, Some(peer("c")));
    assert_eq!(snapshot[3].peer, Some(peer("a")));
}

/// Unbinding twice leaves the same slot state as unbinding once.
#[test]
fn double_disconnect_is_idempotent() {
    let (manager, _transport, _sink) = manager_with(4);

    connect(&manager, "a");
    disconnect(&manager, "a");
    let once = format!("{:?}", manager.snapshot());
    disconnect(&manager, "a");
    let twice = format!("{:?}", manager.snapshot());
    assert_eq!(once, twice);
}

/// A disconnect for a peer that never finished connecting is a no-op.
#[test]
fn disconnect_of_unknown_peer_is_a_no_op() {
    let (manager, _transport, _sink) = manager_with(4);
    connect(&manager, "a");
    let before = format!("{:?}", manager.snapshot());
    disconnect(&manager, "ghost");
    assert_eq!(before, format!("{:?}", manager.snapshot()));
}

/// Connecting reservations hold a slot, so the accept check already
/// accounts for peers still mid-handshake.
#[test]
fn connecting_reservation_consumes_capacity() {
    let (manager, _transport, _sink) = manager_with(1);

    manager.peer_state_changed(peer("a"), PeerSessionState::Connecting);
    assert!(!manager.approve_connection(&peer("b")));

    let snapshot = manager.snapshot();
    assert_eq!(snapshot[0].state, ConnectionState::Connecting);

    // The reservation dissolves if the peer never completes.
    disconnect(&manager, "a");
    assert!(manager.approve_connection(&peer("b")));
}

/// stop_hosting is deterministic: discovery stops, every link is torn
/// down, and no slot remains bound when it returns.
#[test]
fn stop_hosting_unbinds_every_slot() {
    let (manager, transport, _sink) = manager_with(4);

    manager.start_hosting().unwrap();
    connect(&manager, "a");
    connect(&manager, "b");

    manager.stop_hosting();

    assert!(!manager.is_hosting());
    let commands = transport.commands();
    assert!(commands.contains(&Command::StopAdvertising));
    assert!(commands.contains(&Command::StopBrowsing));
    assert!(commands.contains(&Command::DisconnectAll));

    for slot in manager.snapshot() {
        assert_eq!(slot.state, ConnectionState::Disconnected);
        assert!(slot.peer.is_none());
        assert_eq!(slot.swing_count, 0);
        assert!(slot.last_sample.is_none());
    }
}

/// A discovered paddler is invited once; known and already-tracked peers
/// are never re-invited.
#[test]
fn discovered_paddler_is_invited_once() {
    let (manager, transport, _sink) = manager_with(4);
    manager.start_hosting().unwrap();

    manager.peer_discovered(peer("a"));
    manager.peer_discovered(peer("a"));

    let invites: Vec<_> = transport
        .commands()
        .into_iter()
        .filter(|c| matches!(c, Command::Invite(_, _)))
        .collect();
    assert_eq!(
        invites,
        vec![Command::Invite(peer("a"), Duration::from_secs(30))]
    );

    // Once tracked in a slot, rediscovery does not re-invite either.
    connect(&manager, "a");
    manager.peer_discovered(peer("a"));
    let invites = transport
        .commands()
        .into_iter()
        .filter(|c| matches!(c, Command::Invite(_, _)))
        .count();
    assert_eq!(invites, 1);
}

/// Discovery is idle until hosting starts, and a full table stops invites.
#[test]
fn discovery_respects_hosting_state_and_capacity() {
    let (manager, transport, _sink) = manager_with(1);

    manager.peer_discovered(peer("early"));
    assert!(transport
        .commands()
        .iter()
        .all(|c| !matches!(c, Command::Invite(_, _))));

    manager.start_hosting().unwrap();
    connect(&manager, "a");
    manager.peer_discovered(peer("late"));
    assert!(transport
        .commands()
        .iter()
        .all(|c| !matches!(c, Command::Invite(_, _))));
}

/// A failed advertiser start leaves a persistent error flag that only an
/// explicit hosting restart clears.
#[test]
fn discovery_failure_flag_persists_until_restart() {
    let (manager, transport, _sink) = manager_with(4);

    *transport.fail_advertise.lock().unwrap() = Some("port in use".to_string());
    assert!(manager.start_hosting().is_err());
    assert!(!manager.is_hosting());
    let error = manager.last_discovery_error().expect("flag should be set");
    assert_eq!(error.message, "port in use");

    // Still set until the operator retries.
    assert!(manager.last_discovery_error().is_some());

    *transport.fail_advertise.lock().unwrap() = None;
    manager.start_hosting().unwrap();
    assert!(manager.is_hosting());
    assert!(manager.last_discovery_error().is_none());
}

/// A failed browser start flags the error and winds advertising back so
/// the host is not left half-started.
#[test]
fn browse_failure_rolls_back_advertising() {
    let (manager, transport, _sink) = manager_with(4);

    *transport.fail_browse.lock().unwrap() = Some("multicast join failed".to_string());
    assert!(manager.start_hosting().is_err());
    assert!(!manager.is_hosting());

    let error = manager.last_discovery_error().expect("flag should be set");
    assert_eq!(error.kind, DiscoveryErrorKind::Browse);
    assert!(transport.commands().contains(&Command::StopAdvertising));
}
