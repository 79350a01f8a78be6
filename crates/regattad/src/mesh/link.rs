//! TCP session links and the `MeshTransport` implementation.
//!
//! One TCP connection per paddler. Inbound connections open with a Hello
//! frame and are admitted or refused by the session core via the
//! ConnectionRequest event; invites dial out to a discovered paddler's
//! session port. Established links carry Motion frames until either side
//! closes or the host tears the link down.

use std::net::{SocketAddr, SocketAddrV6};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;
use zerocopy::{AsBytes, FromBytes};

use regatta_core::wire::{FrameHeader, FrameKind, WireError, MAX_FRAME, WIRE_VERSION};
use regatta_session::{
    DiscoveryError, DiscoveryErrorKind, MeshEvent, MeshTransport, PeerId, PeerSessionState,
    TransportError,
};

use super::discover::PaddlerRegistry;
use super::{announce, discover};

/// How long an inbound connection waits for the session core's accept
/// decision before it is refused.
const APPROVAL_TIMEOUT: Duration = Duration::from_secs(5);

/// An established link. Dropping the shutdown sender ends the read task.
struct LinkHandle {
    shutdown: oneshot::Sender<()>,
}

/// The concrete link-local mesh transport.
pub struct LinkLocalMesh {
    this: Weak<Self>,
    host_name: String,
    interface_index: u32,
    announce_port: u16,
    session_port: u16,
    advertising: AtomicBool,
    events: mpsc::UnboundedSender<MeshEvent>,
    registry: PaddlerRegistry,
    links: DashMap<PeerId, LinkHandle>,
    announce_task: Mutex<Option<JoinHandle<()>>>,
    browse_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LinkLocalMesh {
    /// Bind the session listener and start accepting. Connections arriving
    /// while the host is not advertising are dropped without a reply.
    pub async fn bind(
        host_name: String,
        interface: &str,
        announce_port: u16,
        session_port: u16,
        events: mpsc::UnboundedSender<MeshEvent>,
    ) -> Result<Arc<Self>> {
        let interface_index = announce::if_index(interface)?;

        let listener = TcpListener::bind(("::", session_port))
            .await
            .context("failed to bind session listener")?;
        let session_port = listener.local_addr()?.port();

        let mesh = Arc::new_cyclic(|weak| Self {
            this: weak.clone(),
            host_name,
            interface_index,
            announce_port,
            session_port,
            advertising: AtomicBool::new(false),
            events,
            registry: discover::new_registry(),
            links: DashMap::new(),
            announce_task: Mutex::new(None),
            browse_tasks: Mutex::new(Vec::new()),
        });

        tokio::spawn(mesh.clone().accept_loop(listener));
        Ok(mesh)
    }

    /// The bound session port, for logging and announcements.
    pub fn session_port(&self) -> u16 {
        self.session_port
    }

    // ── Inbound path ─────────────────────────────────────────────────────────

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if !self.advertising.load(Ordering::SeqCst) {
                        tracing::debug!(%addr, "connection while not advertising, dropping");
                        continue;
                    }
                    let mesh = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = mesh.serve_inbound(stream, addr).await {
                            tracing::debug!(%addr, error = %e, "inbound link setup failed");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn serve_inbound(self: Arc<Self>, mut stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let (kind, payload) = read_frame(&mut stream).await?;
        if kind != FrameKind::Hello {
            bail!("expected hello frame, got {kind:?}");
        }
        let name = String::from_utf8(payload.to_vec()).context("hello name is not UTF-8")?;
        if name.is_empty() {
            bail!("hello frame with empty name");
        }
        let peer = PeerId::new(name);
        tracing::info!(%peer, %addr, "connection request");

        let (respond, decision) = oneshot::channel();
        self.send_event(MeshEvent::ConnectionRequest {
            peer: peer.clone(),
            respond,
        });
        let accepted = matches!(time::timeout(APPROVAL_TIMEOUT, decision).await, Ok(Ok(true)));

        if !accepted {
            // Refused peers never enter the session; no state events.
            let _ = write_frame(&mut stream, FrameKind::Reject, &[]).await;
            tracing::info!(%peer, "connection refused");
            return Ok(());
        }

        self.send_event(MeshEvent::StateChanged {
            peer: peer.clone(),
            state: PeerSessionState::Connecting,
        });
        write_frame(&mut stream, FrameKind::Accept, &[]).await?;
        self.register_link(peer, stream);
        Ok(())
    }

    // ── Established links ────────────────────────────────────────────────────

    /// Register a link and announce the peer as connected. The read task
    /// owns the stream from here on.
    fn register_link(self: &Arc<Self>, peer: PeerId, stream: TcpStream) {
        let (shutdown, shutdown_rx) = oneshot::channel();
        self.links.insert(peer.clone(), LinkHandle { shutdown });

        let mesh = self.clone();
        let reader_peer = peer.clone();
        tokio::spawn(async move {
            mesh.read_loop(reader_peer, stream, shutdown_rx).await;
        });

        self.send_event(MeshEvent::StateChanged {
            peer,
            state: PeerSessionState::Connected,
        });
    }

    async fn read_loop(
        self: Arc<Self>,
        peer: PeerId,
        mut stream: TcpStream,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            let frame = tokio::select! {
                _ = &mut shutdown => {
                    // Host-side teardown. Whoever removed the link handle
                    // already emitted the disconnect event.
                    let _ = write_frame(&mut stream, FrameKind::Bye, &[]).await;
                    return;
                }
                frame = read_frame(&mut stream) => frame,
            };

            match frame {
                Ok((FrameKind::Motion, payload)) => {
                    self.send_event(MeshEvent::Data {
                        peer: peer.clone(),
                        bytes: payload,
                    });
                }
                Ok((FrameKind::Bye, _)) => {
                    tracing::debug!(%peer, "peer closed link");
                    break;
                }
                Ok((kind, _)) => {
                    tracing::debug!(%peer, ?kind, "unexpected frame on established link");
                }
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "link read ended");
                    break;
                }
            }
        }

        if self.links.remove(&peer).is_some() {
            self.send_event(MeshEvent::StateChanged {
                peer,
                state: PeerSessionState::Disconnected,
            });
        }
    }

    // ── Outbound path ────────────────────────────────────────────────────────

    async fn dial(dest: SocketAddrV6, host_name: &str) -> Result<TcpStream> {
        let mut stream = TcpStream::connect(dest)
            .await
            .with_context(|| format!("connect to {dest}"))?;
        write_frame(&mut stream, FrameKind::Hello, host_name.as_bytes()).await?;
        let (kind, _) = read_frame(&mut stream).await?;
        match kind {
            FrameKind::Accept => Ok(stream),
            FrameKind::Reject => bail!("paddler refused the invitation"),
            other => bail!("expected accept/reject, got {other:?}"),
        }
    }

    fn send_event(&self, event: MeshEvent) {
        let _ = self.events.send(event);
    }
}

impl MeshTransport for LinkLocalMesh {
    fn start_advertising(&self) -> Result<(), TransportError> {
        let mut guard = self.announce_task.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }

        // Build the socket here so bind/setsockopt failures surface
        // synchronously to the caller.
        let socket = announce::make_multicast_socket(self.interface_index)
            .map_err(|e| TransportError(format!("{e:#}")))?;

        self.advertising.store(true, Ordering::SeqCst);
        let events = self.events.clone();
        let host_name = self.host_name.clone();
        let (session_port, announce_port, interface_index) =
            (self.session_port, self.announce_port, self.interface_index);
        *guard = Some(tokio::spawn(async move {
            if let Err(e) =
                announce::announce_loop(socket, host_name, session_port, announce_port, interface_index)
                    .await
            {
                let _ = events.send(MeshEvent::DiscoveryError(DiscoveryError {
                    kind: DiscoveryErrorKind::Advertise,
                    message: format!("{e:#}"),
                }));
            }
        }));
        Ok(())
    }

    fn stop_advertising(&self) {
        self.advertising.store(false, Ordering::SeqCst);
        if let Some(task) = self.announce_task.lock().unwrap().take() {
            task.abort();
        }
    }

    fn start_browsing(&self) -> Result<(), TransportError> {
        let mut guard = self.browse_tasks.lock().unwrap();
        if !guard.is_empty() {
            return Ok(());
        }

        let socket = discover::make_listener_socket(self.announce_port, self.interface_index)
            .map_err(|e| TransportError(format!("{e:#}")))?;

        let registry = self.registry.clone();
        let events = self.events.clone();
        guard.push(tokio::spawn({
            let registry = registry.clone();
            let events = events.clone();
            async move {
                if let Err(e) = discover::listener_loop(socket, registry, events.clone()).await {
                    let _ = events.send(MeshEvent::DiscoveryError(DiscoveryError {
                        kind: DiscoveryErrorKind::Browse,
                        message: format!("{e:#}"),
                    }));
                }
            }
        }));
        guard.push(tokio::spawn(async move {
            let _ = discover::expiry_loop(registry, events).await;
        }));
        Ok(())
    }

    fn stop_browsing(&self) {
        for task in self.browse_tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        self.registry.clear();
    }

    fn invite(&self, peer: &PeerId, timeout: Duration) {
        let Some(entry) = self.registry.get(peer.as_str()) else {
            tracing::warn!(%peer, "invite for unknown paddler, ignoring");
            return;
        };
        let dest = SocketAddrV6::new(entry.addr, entry.session_port, 0, self.interface_index);
        drop(entry);

        let Some(mesh) = self.this.upgrade() else {
            return;
        };
        let peer = peer.clone();
        tokio::spawn(async move {
            mesh.send_event(MeshEvent::StateChanged {
                peer: peer.clone(),
                state: PeerSessionState::Connecting,
            });

            match time::timeout(timeout, Self::dial(dest, &mesh.host_name)).await {
                Ok(Ok(stream)) => {
                    tracing::info!(%peer, %dest, "invitation accepted");
                    mesh.register_link(peer, stream);
                }
                Ok(Err(e)) => {
                    tracing::info!(%peer, error = %e, "invitation failed");
                    mesh.send_event(MeshEvent::StateChanged {
                        peer,
                        state: PeerSessionState::Disconnected,
                    });
                }
                Err(_) => {
                    tracing::info!(%peer, "invitation timed out");
                    mesh.send_event(MeshEvent::StateChanged {
                        peer,
                        state: PeerSessionState::Disconnected,
                    });
                }
            }
        });
    }

    fn disconnect(&self, peer: &PeerId) {
        if let Some((peer, handle)) = self.links.remove(peer) {
            let _ = handle.shutdown.send(());
            tracing::info!(%peer, "link torn down");
            self.send_event(MeshEvent::StateChanged {
                peer,
                state: PeerSessionState::Disconnected,
            });
        }
    }

    fn disconnect_all(&self) {
        let peers: Vec<PeerId> = self.links.iter().map(|e| e.key().clone()).collect();
        for peer in peers {
            self.disconnect(&peer);
        }
    }
}

// ── Frame I/O ─────────────────────────────────────────────────────────────────

/// Read one length-prefixed frame.
pub async fn read_frame(stream: &mut TcpStream) -> Result<(FrameKind, Bytes)> {
    let mut header_buf = [0u8; 6];
    stream.read_exact(&mut header_buf).await?;
    let header = FrameHeader::read_from(&header_buf[..]).context("short frame header")?;

    let version = header.version;
    if version != WIRE_VERSION {
        return Err(WireError::UnknownVersion(version).into());
    }
    let kind = FrameKind::try_from(header.kind)?;
    let length = header.length as usize;
    if length > MAX_FRAME {
        return Err(WireError::FrameTooLarge(length).into());
    }

    let mut payload = vec![0u8; length];
    stream.read_exact(&mut payload).await?;
    Ok((kind, Bytes::from(payload)))
}

/// Write one length-prefixed frame.
pub async fn write_frame(stream: &mut TcpStream, kind: FrameKind, payload: &[u8]) -> Result<()> {
    let header = FrameHeader {
        length: payload.len() as u32,
        kind: kind.into(),
        version: WIRE_VERSION,
    };
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(payload).await?;
    Ok(())
}
