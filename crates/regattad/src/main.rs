//! regattad — Regatta host daemon.
//!
//! Binds the link-local mesh transport, wires it into the session manager,
//! and pumps transport events from a single task so all slot mutations are
//! serialized. Swings land in a logging paddle sink; a real game embeds
//! the session crate and injects its own.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use regatta_core::config::HostConfig;
use regatta_core::{SlotNumber, SwingKind};
use regatta_session::{ActionSink, MeshTransport, SessionManager};

mod mesh;

use mesh::LinkLocalMesh;

/// Logging stand-in for the game's vehicle controller. Odd slots paddle
/// port, even slots starboard — seat order on the boat.
struct PaddleLog;

impl ActionSink for PaddleLog {
    fn on_swing(&self, slot: SlotNumber, kind: SwingKind) {
        let side = if slot % 2 == 1 { "port" } else { "starboard" };
        tracing::info!(slot, ?kind, side, "paddle stroke");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = HostConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = HostConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        HostConfig::default()
    });

    let interface = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.network.interface.clone());
    if interface.is_empty() {
        anyhow::bail!("no network interface: pass one as the first argument or set network.interface");
    }
    tracing::info!(interface, host = %config.host.name, "regattad starting");

    // Transport + manager
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mesh = LinkLocalMesh::bind(
        config.host.name.clone(),
        &interface,
        config.network.announce_port,
        config.network.session_port,
        event_tx,
    )
    .await?;
    tracing::info!(session_port = mesh.session_port(), "session listener bound");

    let transport: Arc<dyn MeshTransport> = mesh.clone();
    let manager = SessionManager::new(&config.session, transport, Arc::new(PaddleLog));

    // Event pump — the single task through which every transport event
    // reaches the manager.
    let pump = {
        let manager = manager.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                manager.handle_event(event);
            }
        })
    };

    manager.start_hosting()?;

    // Periodic slot table snapshot
    let printer = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                interval.tick().await;
                for slot in manager.snapshot() {
                    tracing::info!(
                        slot = slot.number,
                        state = ?slot.state,
                        name = %slot.name,
                        device = %slot.device,
                        swings = slot.swing_count,
                        "  slot"
                    );
                }
                if let Some(error) = manager.last_discovery_error() {
                    tracing::warn!(%error, "discovery is down — restart hosting to recover");
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");

    manager.stop_hosting();
    printer.abort();
    pump.abort();

    Ok(())
}
