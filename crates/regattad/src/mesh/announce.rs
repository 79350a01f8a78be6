//! Host announcement broadcast.
//!
//! Periodically sends an Announcement datagram to the link-local multicast
//! address ff02::1 so nearby paddler devices can find the host and connect
//! to its session port.

use std::net::{Ipv6Addr, SocketAddrV6};
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::time;
use zerocopy::AsBytes;

use regatta_core::wire::{
    encode_name, host_hash, Announcement, ANNOUNCE_INTERVAL_SECS, MULTICAST_ADDR, WIRE_VERSION,
};

/// Broadcast the host announcement on a regular interval.
///
/// Runs forever — cancel by aborting the task handle.
pub async fn announce_loop(
    socket: Socket,
    host_name: String,
    session_port: u16,
    announce_port: u16,
    interface_index: u32,
) -> Result<()> {
    let multicast: Ipv6Addr = MULTICAST_ADDR.parse().unwrap();
    let dest = SocketAddrV6::new(multicast, announce_port, 0, interface_index);

    let announcement = Announcement {
        role: host_hash(),
        name: encode_name(&host_name),
        version: WIRE_VERSION as u32,
        session_port,
        flags: 0,
        reserved: 0,
    };

    let mut interval = time::interval(Duration::from_secs(ANNOUNCE_INTERVAL_SECS));

    tracing::info!(
        interface_index,
        session_port,
        interval_secs = ANNOUNCE_INTERVAL_SECS,
        "host announcement starting"
    );

    loop {
        interval.tick().await;

        match socket.send_to(announcement.as_bytes(), &dest.into()) {
            Ok(n) => tracing::trace!(bytes = n, "announcement sent"),
            Err(e) => tracing::warn!(error = %e, "announcement send failed"),
        }
    }
}

/// Create a UDP socket suitable for sending IPv6 multicast.
pub fn make_multicast_socket(interface_index: u32) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_multicast_if_v6(interface_index).context("IPV6_MULTICAST_IF")?;
    // Hops 1 — link-local only, do not route beyond this link
    socket.set_multicast_hops_v6(1).context("IPV6_MULTICAST_HOPS")?;

    Ok(socket)
}

/// Get the OS interface index for a named network interface.
/// Returns an error if the interface does not exist.
pub fn if_index(name: &str) -> Result<u32> {
    let name_cstr = std::ffi::CString::new(name).context("interface name contains null byte")?;
    let index = unsafe { libc::if_nametoindex(name_cstr.as_ptr()) };
    if index == 0 {
        anyhow::bail!("interface '{}' not found", name);
    }
    Ok(index)
}
