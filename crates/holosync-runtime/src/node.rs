//! Spectator host - tick loop implementation

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use holosync_broadcast::{BroadcasterSet, ComponentBroadcaster, TickStats};
use holosync_coord::{DiscoveryOutcome, MarkerDetector, SpatialCoordinateService};
use holosync_core::{ComponentId, ConnectionId, CoordinateId, HoloResult, ServiceId};
use holosync_transport::Transport;

use crate::HostConfig;

/// Peer membership change, queued from any task
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    Joined(ConnectionId),
    Left(ConnectionId),
}

pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub peers_joined: u64,
    pub peers_left: u64,
    pub coordinates_discovered: u64,
    pub marker_reports_rejected: u64,
    pub delta_messages: u64,
    pub complete_messages: u64,
    pub removed_messages: u64,
    pub bytes_sent: u64,
    pub last_tick_duration: Duration,
}

impl RuntimeStats {
    fn record(&mut self, tick: &TickStats) {
        self.delta_messages += tick.delta_messages;
        self.complete_messages += tick.complete_messages;
        self.removed_messages += tick.removed_messages;
        self.bytes_sent += tick.bytes_sent;
    }
}

/// The host side of a spectator session
pub struct SpectatorHost {
    config: HostConfig,
    broadcasters: BroadcasterSet,
    coordinates: Arc<SpatialCoordinateService>,
    peer_tx: PeerEventSender,
    peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
    stats: RuntimeStats,
}

impl SpectatorHost {
    pub fn new(
        config: HostConfig,
        transport: Arc<dyn Transport>,
        detector: Arc<dyn MarkerDetector>,
    ) -> Self {
        let coordinates = SpatialCoordinateService::new(detector, config.discovery_config());
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();

        SpectatorHost {
            config,
            broadcasters: BroadcasterSet::new(transport),
            coordinates: Arc::new(coordinates),
            peer_tx,
            peer_rx,
            stats: RuntimeStats::default(),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    pub fn coordinates(&self) -> &Arc<SpatialCoordinateService> {
        &self.coordinates
    }

    /// Handle for tasks that learn about peers (e.g. a receive loop)
    pub fn peer_events(&self) -> PeerEventSender {
        self.peer_tx.clone()
    }

    pub fn add_component<B>(&mut self, broadcaster: B) -> HoloResult<()>
    where
        B: ComponentBroadcaster + 'static,
    {
        self.broadcasters.add(broadcaster)
    }

    pub fn remove_component(&mut self, service: ServiceId, component: ComponentId) -> bool {
        self.broadcasters.remove(service, component)
    }

    pub fn component_count(&self) -> usize {
        self.broadcasters.len()
    }

    /// Returns false for a peer that is already connected
    pub fn connect(&mut self, connection: ConnectionId) -> bool {
        let added = self.broadcasters.connect(connection);
        if added {
            self.stats.peers_joined += 1;
        }
        added
    }

    /// Returns false for a peer that was not connected
    pub fn disconnect(&mut self, connection: ConnectionId) -> bool {
        let removed = self.broadcasters.disconnect(connection);
        if removed {
            self.stats.peers_left += 1;
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.broadcasters.connection_count()
    }

    /// Run discovery on a background task until `ids` are located or
    /// `token` is cancelled
    pub fn spawn_discovery(
        &self,
        token: CancellationToken,
        ids: Vec<CoordinateId>,
    ) -> JoinHandle<HoloResult<DiscoveryOutcome>> {
        let coordinates = Arc::clone(&self.coordinates);
        tokio::spawn(async move { coordinates.discover_coordinates(token, &ids).await })
    }

    /// Run one host tick
    pub fn tick(&mut self) -> TickStats {
        let start = Instant::now();
        self.stats.ticks += 1;

        while let Ok(event) = self.peer_rx.try_recv() {
            match event {
                PeerEvent::Joined(connection) => {
                    self.connect(connection);
                }
                PeerEvent::Left(connection) => {
                    self.disconnect(connection);
                }
            }
        }

        let summary = self.coordinates.process_pending_updates();
        self.stats.coordinates_discovered += summary.discovered as u64;
        self.stats.marker_reports_rejected += summary.rejected as u64;

        let tick = self.broadcasters.tick();
        self.stats.record(&tick);

        self.stats.last_tick_duration = start.elapsed();
        tick
    }

    /// Tick on the configured interval until `token` is cancelled
    pub async fn run(&mut self, token: CancellationToken) -> RuntimeStats {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            tick_interval = ?self.config.tick_interval,
            components = self.broadcasters.len(),
            "Spectator host running"
        );

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        tracing::info!(
            ticks = self.stats.ticks,
            bytes_sent = self.stats.bytes_sent,
            "Spectator host stopped"
        );
        self.stats.clone()
    }
}

impl Drop for SpectatorHost {
    fn drop(&mut self) {
        self.coordinates.dispose();
    }
}
