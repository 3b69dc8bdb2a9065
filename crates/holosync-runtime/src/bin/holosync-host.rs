//! Demo spectator host over UDP
//!
//! Usage: `holosync-host [PEER_ADDR...]`
//!
//! Peers given on the command line are connected up front; any other address
//! that sends a datagram to the host joins as a spectator. A demo mask
//! component toggles every two seconds.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use holosync_broadcast::{mask_broadcaster, MaskProperties, SharedState};
use holosync_coord::ManualMarkerDetector;
use holosync_core::{ComponentId, HoloError, HoloResult};
use holosync_runtime::{init_tracing, HostConfig, PeerEvent, SpectatorHost};
use holosync_transport::{start_receive_loop, UdpTransport};

const DEMO_TOGGLE_INTERVAL: Duration = Duration::from_secs(2);
const RECEIVE_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> HoloResult<()> {
    let config = HostConfig::from_env()?;
    init_tracing(config.json_logs)?;

    let peers = std::env::args()
        .skip(1)
        .map(|arg| {
            arg.parse::<SocketAddr>()
                .map_err(|e| HoloError::Config(format!("peer {:?}: {}", arg, e)))
        })
        .collect::<HoloResult<Vec<_>>>()?;

    let transport = Arc::new(UdpTransport::bind(config.bind_addr).await?);
    tracing::info!(addr = %transport.local_addr(), "Host bound");

    let detector = Arc::new(ManualMarkerDetector::new());
    let mut host = SpectatorHost::new(config, transport.clone(), detector);

    for peer in peers {
        host.connect(transport.connect(peer));
    }

    let mask = SharedState::new(MaskProperties::default());
    host.add_component(mask_broadcaster(ComponentId::new(1), mask.clone()))?;

    let token = CancellationToken::new();

    // Any datagram from an unknown address registers a spectator
    let mut packets = start_receive_loop(transport.socket(), RECEIVE_QUEUE);
    let peer_events = host.peer_events();
    let receive_transport = transport.clone();
    tokio::spawn(async move {
        while let Some((_, addr)) = packets.recv().await {
            if receive_transport.connection_for(addr).is_none() {
                let id = receive_transport.connect(addr);
                if peer_events.send(PeerEvent::Joined(id)).is_err() {
                    break;
                }
            }
        }
    });

    let toggle_token = token.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DEMO_TOGGLE_INTERVAL);
        loop {
            tokio::select! {
                _ = toggle_token.cancelled() => break,
                _ = interval.tick() => mask.update(|m| m.enabled = !m.enabled),
            }
        }
    });

    let discovery = host.spawn_discovery(token.clone(), Vec::new());

    let shutdown = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {}", e);
        }
        shutdown.cancel();
    });

    let stats = host.run(token).await;
    match discovery.await {
        Ok(Ok(outcome)) => tracing::info!(?outcome, "Discovery finished"),
        Ok(Err(e)) => tracing::warn!("Discovery failed: {}", e),
        Err(e) => tracing::warn!("Discovery task failed: {}", e),
    }

    tracing::info!(
        ticks = stats.ticks,
        peers = stats.peers_joined,
        messages = stats.delta_messages + stats.complete_messages,
        "Host exited"
    );
    Ok(())
}
