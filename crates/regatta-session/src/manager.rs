//! Session management — bridges the mesh transport into slot mutations.
//!
//! The manager owns the slot table behind one mutex; every handler runs its
//! slot work inside that critical section and performs side effects (action
//! sink, event broadcast, transport commands) only after the lock is
//! released. The daemon pumps all transport events through [`Self::handle_event`]
//! from a single task, so handlers are additionally serialized end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use regatta_core::config::SessionConfig;
use regatta_core::{Envelope, SwingEvent};

use crate::events::{SessionEvent, EVENT_CAPACITY};
use crate::sink::ActionSink;
use crate::slots::{SlotSnapshot, SlotTable};
use crate::transport::{
    DiscoveryError, DiscoveryErrorKind, MeshEvent, MeshTransport, PeerId, PeerSessionState,
    TransportError,
};

pub struct SessionManager {
    table: Mutex<SlotTable>,
    transport: Arc<dyn MeshTransport>,
    sink: Arc<dyn ActionSink>,
    events: broadcast::Sender<SessionEvent>,
    hosting: AtomicBool,
    discovery_error: Mutex<Option<DiscoveryError>>,
    /// Peers invited but not yet heard back from, with the invite time.
    /// Entries expire after the invite timeout.
    pending_invites: Mutex<HashMap<PeerId, Instant>>,
    invite_timeout: Duration,
}

impl SessionManager {
    /// Session limits are fixed here for the manager's lifetime.
    pub fn new(
        config: &SessionConfig,
        transport: Arc<dyn MeshTransport>,
        sink: Arc<dyn ActionSink>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            table: Mutex::new(SlotTable::new(config.max_players)),
            transport,
            sink,
            events,
            hosting: AtomicBool::new(false),
            discovery_error: Mutex::new(None),
            pending_invites: Mutex::new(HashMap::new()),
            invite_timeout: Duration::from_secs(config.invite_timeout_secs),
        })
    }

    // ── Control surface ──────────────────────────────────────────────────────

    /// Start advertising and browsing. A start failure is recorded as the
    /// persistent discovery error and returned; nothing is retried — the
    /// operator restarts hosting explicitly.
    pub fn start_hosting(&self) -> Result<(), DiscoveryError> {
        *self.discovery_error.lock().unwrap() = None;

        if let Err(TransportError(message)) = self.transport.start_advertising() {
            return Err(self.fail_discovery(DiscoveryErrorKind::Advertise, message));
        }
        if let Err(TransportError(message)) = self.transport.start_browsing() {
            self.transport.stop_advertising();
            return Err(self.fail_discovery(DiscoveryErrorKind::Browse, message));
        }

        self.hosting.store(true, Ordering::SeqCst);
        tracing::info!("hosting started");
        self.emit(SessionEvent::HostingChanged(true));
        Ok(())
    }

    /// Stop advertising and browsing, tear down every connection, and
    /// unbind every slot. Deterministic: no slot remains bound after this
    /// returns. Safe to call when not hosting.
    pub fn stop_hosting(&self) {
        self.hosting.store(false, Ordering::SeqCst);
        self.transport.stop_advertising();
        self.transport.stop_browsing();
        self.transport.disconnect_all();
        self.pending_invites.lock().unwrap().clear();

        let snapshots = {
            let mut table = self.table.lock().unwrap();
            table.unbind_all();
            table.snapshot()
        };
        for snapshot in snapshots {
            self.emit(SessionEvent::SlotChanged(snapshot));
        }

        tracing::info!("hosting stopped, all slots unbound");
        self.emit(SessionEvent::HostingChanged(false));
    }

    pub fn is_hosting(&self) -> bool {
        self.hosting.load(Ordering::SeqCst)
    }

    /// Read-only view of every slot for UI/telemetry consumers.
    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.table.lock().unwrap().snapshot()
    }

    /// The persistent discovery failure flag, if any.
    pub fn last_discovery_error(&self) -> Option<DiscoveryError> {
        self.discovery_error.lock().unwrap().clone()
    }

    /// Subscribe to session events. Consumers that lag are dropped behind
    /// and should resynchronize from [`Self::snapshot`].
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ── Inbound surface ──────────────────────────────────────────────────────

    /// Dispatch one transport event. The daemon calls this from a single
    /// pump task.
    pub fn handle_event(&self, event: MeshEvent) {
        match event {
            MeshEvent::Discovered(peer) => self.peer_discovered(peer),
            MeshEvent::Lost(peer) => self.peer_lost(&peer),
            MeshEvent::ConnectionRequest { peer, respond } => {
                let accept = self.approve_connection(&peer);
                let _ = respond.send(accept);
            }
            MeshEvent::StateChanged { peer, state } => self.peer_state_changed(peer, state),
            MeshEvent::Data { peer, bytes } => self.data_received(&peer, &bytes),
            MeshEvent::DiscoveryError(error) => self.discovery_failed(error),
        }
    }

    /// Capacity check for an incoming connection request. Pure control
    /// flow — a rejection is expected behavior, not an error, and the
    /// rejected paddler simply never connects.
    pub fn approve_connection(&self, peer: &PeerId) -> bool {
        let table = self.table.lock().unwrap();
        let accept = table.has_free_slot() && table.connected_count() < table.max_players();
        if accept {
            tracing::info!(%peer, "accepting connection request");
        } else {
            tracing::info!(%peer, max_players = table.max_players(), "rejecting connection request, no capacity");
        }
        accept
    }

    /// Browse side: a paddler announcement was seen. Invite it unless it
    /// is already tracked, already invited, or there is no capacity.
    pub fn peer_discovered(&self, peer: PeerId) {
        if !self.is_hosting() {
            return;
        }

        {
            let table = self.table.lock().unwrap();
            if table.lookup(&peer).is_some() {
                tracing::debug!(%peer, "discovered peer already tracked, not re-inviting");
                return;
            }
            if !table.has_free_slot() {
                tracing::debug!(%peer, "discovered peer but no free slot, not inviting");
                return;
            }
        }

        let mut invites = self.pending_invites.lock().unwrap();
        invites.retain(|_, sent| sent.elapsed() < self.invite_timeout);
        if invites.contains_key(&peer) {
            return;
        }
        invites.insert(peer.clone(), Instant::now());
        drop(invites);

        tracing::info!(%peer, timeout_secs = self.invite_timeout.as_secs(), "inviting discovered paddler");
        self.transport.invite(&peer, self.invite_timeout);
    }

    /// Browse side: a paddler stopped announcing. Discovery visibility
    /// only — if it was connected, the state change arrives separately.
    pub fn peer_lost(&self, peer: &PeerId) {
        tracing::debug!(%peer, "paddler announcement lost");
    }

    pub fn peer_state_changed(&self, peer: PeerId, state: PeerSessionState) {
        match state {
            PeerSessionState::Connecting => self.on_peer_connecting(peer),
            PeerSessionState::Connected => self.on_peer_connected(peer),
            PeerSessionState::Disconnected => self.on_peer_disconnected(peer),
        }
    }

    /// One raw message from a connected peer: decode, route to the peer's
    /// slot, drive its detector, and deliver any swing to the action sink.
    pub fn data_received(&self, peer: &PeerId, bytes: &[u8]) {
        let envelope = match Envelope::decode(bytes) {
            Ok(envelope) => envelope,
            Err(error) => {
                // Malformed envelope: drop the sample, leave the connection.
                tracing::warn!(%peer, %error, "dropping malformed envelope");
                return;
            }
        };

        let (swing, snapshot) = {
            let mut table = self.table.lock().unwrap();
            match table.ingest(peer, envelope) {
                Some(outcome) => (outcome.swing, table.snapshot_slot(outcome.index)),
                None => {
                    // Unknown or no-longer-bound peer — an in-flight sample
                    // for an unbound slot is dropped silently.
                    tracing::trace!(%peer, "sample for unmapped peer dropped");
                    return;
                }
            }
        };

        if let Some(event) = swing {
            self.deliver_swing(event);
        }
        self.emit(SessionEvent::SlotChanged(snapshot));
    }

    /// The advertiser or browser failed after starting.
    pub fn discovery_failed(&self, error: DiscoveryError) {
        tracing::error!(kind = ?error.kind, message = %error.message, "discovery failure");
        *self.discovery_error.lock().unwrap() = Some(error.clone());
        self.emit(SessionEvent::DiscoveryFailed(error));
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    fn on_peer_connecting(&self, peer: PeerId) {
        let snapshot = {
            let mut table = self.table.lock().unwrap();
            if table.lookup(&peer).is_some() {
                return;
            }
            match table.reserve_free(peer.clone()) {
                Ok(index) => {
                    tracing::info!(%peer, slot = index + 1, "peer connecting, slot reserved");
                    table.snapshot_slot(index)
                }
                Err(_) => {
                    // Not fatal — the capacity verdict lands at Connected.
                    tracing::debug!(%peer, "peer connecting but no slot to reserve");
                    return;
                }
            }
        };
        self.emit(SessionEvent::SlotChanged(snapshot));
    }

    fn on_peer_connected(&self, peer: PeerId) {
        self.pending_invites.lock().unwrap().remove(&peer);

        let outcome = {
            let mut table = self.table.lock().unwrap();
            let result = match table.lookup(&peer) {
                Some(index) => table.bind(index, peer.clone(), peer.as_str()).map(|_| index),
                None => table.bind_free(peer.clone(), peer.as_str()),
            };
            result.map(|index| (index, table.snapshot_slot(index)))
        };

        match outcome {
            Ok((index, snapshot)) => {
                tracing::info!(%peer, slot = index + 1, "peer connected");
                self.emit(SessionEvent::SlotChanged(snapshot));
            }
            Err(error) => {
                // The accept-time capacity check said yes but the table is
                // full now — a racing connect. Tear the connection down
                // rather than leave the peer orphaned.
                tracing::error!(%peer, %error, "no slot for connected peer, tearing down (slot invariant violation)");
                self.transport.disconnect(&peer);
            }
        }
    }

    fn on_peer_disconnected(&self, peer: PeerId) {
        self.pending_invites.lock().unwrap().remove(&peer);

        let snapshot = {
            let mut table = self.table.lock().unwrap();
            match table.lookup(&peer) {
                Some(index) => {
                    table.unbind(index);
                    tracing::info!(%peer, slot = index + 1, "peer disconnected, slot freed");
                    Some(table.snapshot_slot(index))
                }
                None => {
                    // Never finished connecting into a slot.
                    tracing::debug!(%peer, "disconnect for untracked peer");
                    None
                }
            }
        };

        if let Some(snapshot) = snapshot {
            self.emit(SessionEvent::SlotChanged(snapshot));
        }
    }

    // ── Plumbing ─────────────────────────────────────────────────────────────

    fn deliver_swing(&self, event: SwingEvent) {
        tracing::info!(
            slot = event.slot,
            kind = ?event.kind,
            count = event.count,
            "swing detected"
        );
        self.sink.on_swing(event.slot, event.kind);
        self.emit(SessionEvent::Swing(event));
    }

    fn fail_discovery(&self, kind: DiscoveryErrorKind, message: String) -> DiscoveryError {
        let error = DiscoveryError { kind, message };
        tracing::error!(kind = ?error.kind, message = %error.message, "failed to start discovery");
        *self.discovery_error.lock().unwrap() = Some(error.clone());
        self.emit(SessionEvent::DiscoveryFailed(error.clone()));
        error
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine — events are telemetry, not control flow.
        let _ = self.events.send(event);
    }
}
