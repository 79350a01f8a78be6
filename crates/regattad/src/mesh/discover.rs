//! Paddler announcement listener.
//!
//! Joins the ff02::1 multicast group and listens for paddler Announcement
//! datagrams. Every valid announcement is upserted into the registry and
//! surfaced as a `Discovered` event — the session manager deduplicates
//! already-tracked and already-invited peers, so repeated announcements
//! are cheap. A separate expiry task removes paddlers that went quiet.

use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dashmap::DashMap;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use zerocopy::FromBytes;

use regatta_core::wire::{
    decode_name, paddler_hash, Announcement, MULTICAST_ADDR, PADDLER_TTL_SECS, WIRE_VERSION,
};
use regatta_session::{MeshEvent, PeerId};

/// Tracked state for a discovered paddler.
#[derive(Debug, Clone)]
pub struct DiscoveredPaddler {
    /// Link-local address (from the UDP source address).
    pub addr: Ipv6Addr,
    /// TCP port accepting session connections.
    pub session_port: u16,
    /// Last time any announcement arrived from this paddler.
    pub last_seen: Instant,
}

/// The paddler registry — shared between the browse tasks and invites.
/// Keyed on display name.
pub type PaddlerRegistry = Arc<DashMap<String, DiscoveredPaddler>>;

pub fn new_registry() -> PaddlerRegistry {
    Arc::new(DashMap::new())
}

/// Listen for paddler announcements and populate the registry.
///
/// Runs forever — cancel by aborting the task handle.
pub async fn listener_loop(
    socket: std::net::UdpSocket,
    registry: PaddlerRegistry,
    events: mpsc::UnboundedSender<MeshEvent>,
) -> Result<()> {
    // Convert to tokio UdpSocket for async recv
    let socket = UdpSocket::from_std(socket).context("failed to convert to tokio UdpSocket")?;

    let mut buf = vec![0u8; 256];

    tracing::info!("paddler listener starting");

    loop {
        let (len, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "recv_from failed");
                continue;
            }
        };

        let sender_addr = match peer_addr {
            std::net::SocketAddr::V6(v6) => *v6.ip(),
            std::net::SocketAddr::V4(_) => {
                tracing::warn!("received IPv4 datagram on IPv6 socket, ignoring");
                continue;
            }
        };

        let Some(announcement) = Announcement::read_from_prefix(&buf[..len]) else {
            tracing::trace!("failed to parse announcement");
            continue;
        };

        // Copy packed fields to locals to avoid unaligned access
        let role = announcement.role;
        let version = announcement.version;
        let session_port = announcement.session_port;
        let name_field = announcement.name;

        // The host's own announcements also land here — different role hash.
        if role != paddler_hash() {
            continue;
        }
        if version != WIRE_VERSION as u32 {
            tracing::trace!(version, "ignoring announcement with unknown version");
            continue;
        }

        let name = decode_name(&name_field);
        if name.is_empty() {
            tracing::trace!("ignoring announcement with empty name");
            continue;
        }

        tracing::debug!(%name, addr = %sender_addr, port = session_port, "paddler announcement");

        registry.insert(
            name.clone(),
            DiscoveredPaddler {
                addr: sender_addr,
                session_port,
                last_seen: Instant::now(),
            },
        );

        let _ = events.send(MeshEvent::Discovered(PeerId::new(name)));
    }
}

/// Remove registry entries that have not been refreshed within the TTL.
///
/// Runs forever — cancel by aborting the task handle.
pub async fn expiry_loop(
    registry: PaddlerRegistry,
    events: mpsc::UnboundedSender<MeshEvent>,
) -> Result<()> {
    let ttl = Duration::from_secs(PADDLER_TTL_SECS);
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        interval.tick().await;

        let mut lost = Vec::new();
        registry.retain(|name, entry| {
            let fresh = entry.last_seen.elapsed() < ttl;
            if !fresh {
                lost.push(name.clone());
            }
            fresh
        });

        for name in lost {
            tracing::debug!(%name, "paddler announcement expired");
            let _ = events.send(MeshEvent::Lost(PeerId::new(name)));
        }
    }
}

/// Create a UDP socket joined to the ff02::1 multicast group.
pub fn make_listener_socket(announce_port: u16, interface_index: u32) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_only_v6(true).context("IPV6_V6ONLY")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, announce_port, 0, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;

    let multicast: Ipv6Addr = MULTICAST_ADDR.parse().unwrap();
    socket
        .join_multicast_v6(&multicast, interface_index)
        .context("IPV6_JOIN_GROUP")?;

    Ok(socket.into())
}
