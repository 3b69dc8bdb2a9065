//! End-to-end Integration Test Suite
//!
//! Tests that verify the complete host to spectator flow:
//! - Complete state for joining spectators, deltas afterwards
//! - Convergence of every mirror with the host's live state
//! - Component removal and reconnect resync
//! - Coordinate discovery driven through the host

use std::sync::Arc;

use holosync_broadcast::{
    mask_broadcaster, transform_broadcaster, MaskProperties, MirrorEvent, SceneMirror, SharedState,
    TransformProperties,
};
use holosync_coord::ManualMarkerDetector;
use holosync_core::{ComponentId, ConnectionId, HoloResult, Quaternion, Vector3};
use holosync_runtime::{HostConfig, SpectatorHost};
use holosync_transport::{MemoryReceiver, MemoryTransport};

// ============================================================================
// SIMULATED SPECTATOR
// ============================================================================

/// A spectator device mirroring host state from an in-process connection
pub struct SimulatedSpectator {
    pub connection: ConnectionId,
    receiver: MemoryReceiver,
    mirror: SceneMirror,
    events: Vec<MirrorEvent>,
    decode_errors: usize,
}

impl SimulatedSpectator {
    /// Open a connection on `transport`; the host still has to be told
    pub fn open(transport: &MemoryTransport) -> Self {
        let (connection, receiver) = transport.open();
        SimulatedSpectator {
            connection,
            receiver,
            mirror: SceneMirror::new(),
            events: Vec::new(),
            decode_errors: 0,
        }
    }

    /// Apply everything received so far; returns the number of messages
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(bytes) = self.receiver.try_recv() {
            match self.mirror.apply(&bytes) {
                Ok(event) => self.events.push(event),
                Err(_) => self.decode_errors += 1,
            }
            applied += 1;
        }
        applied
    }

    pub fn mirror(&self) -> &SceneMirror {
        &self.mirror
    }

    pub fn events(&self) -> &[MirrorEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<MirrorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn decode_errors(&self) -> usize {
        self.decode_errors
    }
}

// ============================================================================
// INTEGRATION TEST HARNESS
// ============================================================================

/// Configuration for integration tests
#[derive(Debug, Clone)]
pub struct IntegrationTestConfig {
    /// Mask and transform components each
    pub components: usize,

    /// Spectators connected before the first tick
    pub spectators: usize,

    /// Spectators connected halfway through
    pub late_spectators: usize,

    pub ticks: usize,

    /// A component mutates every `mutation_period` ticks; zero disables
    pub mutation_period: usize,
}

impl Default for IntegrationTestConfig {
    fn default() -> Self {
        Self {
            components: 4,
            spectators: 2,
            late_spectators: 1,
            ticks: 30,
            mutation_period: 3,
        }
    }
}

impl IntegrationTestConfig {
    pub fn minimal() -> Self {
        Self {
            components: 1,
            spectators: 1,
            late_spectators: 0,
            ticks: 5,
            mutation_period: 1,
        }
    }

    pub fn stress() -> Self {
        Self {
            components: 32,
            spectators: 4,
            late_spectators: 4,
            ticks: 200,
            mutation_period: 2,
        }
    }
}

/// Result of an integration run
#[derive(Debug, Clone)]
pub struct IntegrationTestResult {
    pub converged: bool,
    pub ticks: usize,
    pub messages_delivered: usize,
    pub decode_errors: usize,
    pub bytes_sent: u64,

    /// One line per mirrored value that differs from the host
    pub divergences: Vec<String>,
}

impl IntegrationTestResult {
    pub fn passed(&self) -> bool {
        self.converged && self.decode_errors == 0
    }
}

/// Host plus spectators over the in-process transport
pub struct IntegrationTestHarness {
    config: IntegrationTestConfig,
    transport: Arc<MemoryTransport>,
    host: SpectatorHost,
    masks: Vec<(ComponentId, SharedState<MaskProperties>)>,
    transforms: Vec<(ComponentId, SharedState<TransformProperties>)>,
    spectators: Vec<SimulatedSpectator>,
    messages_delivered: usize,
}

impl IntegrationTestHarness {
    pub fn new(config: IntegrationTestConfig) -> HoloResult<Self> {
        let transport = Arc::new(MemoryTransport::new());
        let detector = Arc::new(ManualMarkerDetector::new());
        let mut host = SpectatorHost::new(HostConfig::default(), transport.clone(), detector);

        let mut masks = Vec::with_capacity(config.components);
        let mut transforms = Vec::with_capacity(config.components);
        for i in 0..config.components {
            let id = ComponentId::new(i as u32 + 1);

            let mask = SharedState::new(MaskProperties::default());
            host.add_component(mask_broadcaster(id, mask.clone()))?;
            masks.push((id, mask));

            let transform = SharedState::new(TransformProperties::default());
            host.add_component(transform_broadcaster(id, transform.clone()))?;
            transforms.push((id, transform));
        }

        let mut spectators = Vec::new();
        for _ in 0..config.spectators {
            let spectator = SimulatedSpectator::open(&transport);
            host.connect(spectator.connection);
            spectators.push(spectator);
        }

        Ok(Self {
            config,
            transport,
            host,
            masks,
            transforms,
            spectators,
            messages_delivered: 0,
        })
    }

    pub fn host(&mut self) -> &mut SpectatorHost {
        &mut self.host
    }

    pub fn spectators(&self) -> &[SimulatedSpectator] {
        &self.spectators
    }

    /// Run the scripted session and compare every mirror with the host
    pub fn run(&mut self) -> IntegrationTestResult {
        let join_at = self.config.ticks / 2;

        for tick in 0..self.config.ticks {
            self.mutate(tick);

            if tick == join_at {
                for _ in 0..self.config.late_spectators {
                    let spectator = SimulatedSpectator::open(&self.transport);
                    self.host.connect(spectator.connection);
                    self.spectators.push(spectator);
                }
            }

            self.step();
        }

        let divergences = self.check_convergence();
        IntegrationTestResult {
            converged: divergences.is_empty(),
            ticks: self.config.ticks,
            messages_delivered: self.messages_delivered,
            decode_errors: self.spectators.iter().map(|s| s.decode_errors()).sum(),
            bytes_sent: self.host.stats().bytes_sent,
            divergences,
        }
    }

    /// One host tick followed by delivery to every spectator
    pub fn step(&mut self) {
        self.host.tick();
        for spectator in &mut self.spectators {
            self.messages_delivered += spectator.pump();
        }
    }

    fn mutate(&mut self, tick: usize) {
        let period = self.config.mutation_period;
        if period == 0 {
            return;
        }

        for (i, (_, mask)) in self.masks.iter().enumerate() {
            if (tick + i) % period == 0 {
                mask.update(|m| {
                    m.enabled = !m.enabled;
                    if tick % 2 == 0 {
                        m.show_mask_graphic = !m.show_mask_graphic;
                    }
                });
            }
        }

        for (i, (_, transform)) in self.transforms.iter().enumerate() {
            if (tick + i + 1) % period == 0 {
                transform.update(|t| {
                    t.position.x += 0.25;
                    t.rotation = Quaternion::from_euler(tick as f32 * 0.1, 0.0, 0.0);
                    if tick % 5 == 0 {
                        t.scale = Vector3::new(1.0 + tick as f32 * 0.01, 1.0, 1.0);
                    }
                    if tick % 7 == 0 {
                        t.active = !t.active;
                    }
                });
            }
        }
    }

    /// Compare every spectator mirror with the host's live values
    pub fn check_convergence(&self) -> Vec<String> {
        let mut divergences = Vec::new();

        for spectator in &self.spectators {
            for (id, mask) in &self.masks {
                let expected = mask.get();
                let mirrored = spectator.mirror().masks.get(*id);
                if mirrored != Some(&expected) {
                    divergences.push(format!(
                        "{} mask {}: expected {:?}, mirrored {:?}",
                        spectator.connection, id, expected, mirrored
                    ));
                }
            }

            for (id, transform) in &self.transforms {
                let expected = transform.get();
                let mirrored = spectator.mirror().transforms.get(*id);
                if mirrored != Some(&expected) {
                    divergences.push(format!(
                        "{} transform {}: expected {:?}, mirrored {:?}",
                        spectator.connection, id, expected, mirrored
                    ));
                }
            }
        }

        divergences
    }
}

// ============================================================================
// PREDEFINED RUNS
// ============================================================================

pub fn run_basic_convergence() -> HoloResult<IntegrationTestResult> {
    Ok(IntegrationTestHarness::new(IntegrationTestConfig::default())?.run())
}

pub fn run_minimal_convergence() -> HoloResult<IntegrationTestResult> {
    Ok(IntegrationTestHarness::new(IntegrationTestConfig::minimal())?.run())
}

pub fn run_stress_convergence() -> HoloResult<IntegrationTestResult> {
    Ok(IntegrationTestHarness::new(IntegrationTestConfig::stress())?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use holosync_broadcast::{MaskChangeFlags, MASK_SERVICE, TRANSFORM_SERVICE};
    use holosync_coord::{marker_batch, DiscoveryOutcome, LocatedState, Marker};
    use holosync_core::CoordinateId;
    use holosync_wire::ChangeFlags;
    use proptest::prelude::*;
    use tokio_util::sync::CancellationToken;

    fn single_mask() -> (Arc<MemoryTransport>, SpectatorHost, SharedState<MaskProperties>) {
        let transport = Arc::new(MemoryTransport::new());
        let detector = Arc::new(ManualMarkerDetector::new());
        let mut host = SpectatorHost::new(HostConfig::default(), transport.clone(), detector);
        let mask = SharedState::new(MaskProperties::default());
        host.add_component(mask_broadcaster(ComponentId::new(1), mask.clone()))
            .unwrap();
        (transport, host, mask)
    }

    #[test]
    fn test_minimal_convergence() {
        let result = run_minimal_convergence().unwrap();
        assert!(result.passed(), "{:?}", result.divergences);
        assert!(result.messages_delivered > 0);
    }

    #[test]
    fn test_basic_convergence_with_late_joiner() {
        let result = run_basic_convergence().unwrap();
        assert!(result.passed(), "{:?}", result.divergences);
    }

    #[test]
    fn test_stress_convergence() {
        let result = run_stress_convergence().unwrap();
        assert!(result.passed(), "{:?}", result.divergences);
        assert!(result.bytes_sent > 0);
    }

    #[test]
    fn test_disable_reaches_spectator_as_properties_delta() {
        let (transport, mut host, mask) = single_mask();
        let mut spectator = SimulatedSpectator::open(&transport);
        host.connect(spectator.connection);

        host.tick();
        spectator.pump();
        spectator.take_events();

        mask.update(|m| m.enabled = false);
        host.tick();
        assert_eq!(spectator.pump(), 1);

        assert_eq!(
            spectator.events(),
            &[MirrorEvent::Updated {
                service: MASK_SERVICE,
                component: ComponentId::new(1),
                flags: MaskChangeFlags::PROPERTIES.bits(),
            }]
        );
        assert_eq!(
            spectator.mirror().masks.get(ComponentId::new(1)),
            Some(&MaskProperties::new(false, true))
        );
    }

    #[test]
    fn test_idle_host_sends_nothing() {
        let (transport, mut host, _mask) = single_mask();
        let mut spectator = SimulatedSpectator::open(&transport);
        host.connect(spectator.connection);
        host.tick();
        spectator.pump();

        for _ in 0..10 {
            assert_eq!(host.tick().messages(), 0);
        }
        assert_eq!(spectator.pump(), 0);
    }

    #[test]
    fn test_removal_reaches_spectator() {
        let mut harness = IntegrationTestHarness::new(IntegrationTestConfig::minimal()).unwrap();
        harness.step();
        assert!(harness.spectators()[0]
            .mirror()
            .transforms
            .get(ComponentId::new(1))
            .is_some());

        assert!(harness
            .host()
            .remove_component(TRANSFORM_SERVICE, ComponentId::new(1)));
        harness.step();

        let mirror = harness.spectators()[0].mirror();
        assert!(mirror.transforms.is_empty());
        assert_eq!(mirror.masks.len(), 1);
    }

    #[test]
    fn test_reconnect_gets_complete_state() {
        let (transport, mut host, mask) = single_mask();
        let mut spectator = SimulatedSpectator::open(&transport);
        host.connect(spectator.connection);
        host.tick();
        spectator.pump();

        host.disconnect(spectator.connection);
        mask.set(MaskProperties::new(false, false));
        host.tick();
        assert_eq!(spectator.pump(), 0);

        // Missed the change while away
        assert_eq!(
            spectator.mirror().masks.get(ComponentId::new(1)),
            Some(&MaskProperties::default())
        );

        host.connect(spectator.connection);
        host.tick();
        spectator.pump();
        assert_eq!(
            spectator.mirror().masks.get(ComponentId::new(1)),
            Some(&MaskProperties::new(false, false))
        );
    }

    proptest! {
        #[test]
        fn prop_mask_mirror_tracks_host(
            ops in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 1..40)
        ) {
            let (transport, mut host, mask) = single_mask();
            let mut early = SimulatedSpectator::open(&transport);
            host.connect(early.connection);
            let mut late: Option<SimulatedSpectator> = None;

            for (enabled, graphic, join) in ops {
                mask.set(MaskProperties::new(enabled, graphic));
                if join && late.is_none() {
                    let spectator = SimulatedSpectator::open(&transport);
                    host.connect(spectator.connection);
                    late = Some(spectator);
                }

                host.tick();
                early.pump();
                prop_assert_eq!(early.mirror().masks.get(ComponentId::new(1)), Some(&mask.get()));

                if let Some(spectator) = late.as_mut() {
                    spectator.pump();
                    prop_assert_eq!(
                        spectator.mirror().masks.get(ComponentId::new(1)),
                        Some(&mask.get())
                    );
                }
            }
        }
    }

    fn marker(id: i32) -> Marker {
        Marker::new(CoordinateId::new(id), Vector3::new(id as f32, 0.0, 0.0), Quaternion::IDENTITY)
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_through_host() {
        let transport = Arc::new(MemoryTransport::new());
        let detector = Arc::new(ManualMarkerDetector::new());
        let host = SpectatorHost::new(HostConfig::default(), transport, detector.clone());
        let mut discovered = host.coordinates().subscribe_discovered();

        let task = host.spawn_discovery(
            CancellationToken::new(),
            vec![CoordinateId::new(1), CoordinateId::new(2)],
        );
        while !detector.is_detecting() {
            tokio::task::yield_now().await;
        }

        detector.report(marker_batch([marker(1)]));
        assert_eq!(discovered.recv().await.unwrap().id(), CoordinateId::new(1));

        detector.report(marker_batch([marker(2)]));
        assert_eq!(task.await.unwrap().unwrap(), DiscoveryOutcome::Completed);
        assert_eq!(discovered.recv().await.unwrap().id(), CoordinateId::new(2));

        let coordinates = host.coordinates();
        assert_eq!(coordinates.located_state(CoordinateId::new(1)), LocatedState::Resolved);
        assert_eq!(coordinates.located_state(CoordinateId::new(2)), LocatedState::Tracking);
        assert_eq!(
            coordinates.coordinate(CoordinateId::new(2)).unwrap().position(),
            Vector3::new(2.0, 0.0, 0.0)
        );

        // Detector is off once discovery returns
        assert_eq!(detector.stop_count(), 1);
        assert!(!detector.report(marker_batch([marker(3)])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_discovery_through_host() {
        let config = HostConfig {
            simulation: true,
            simulation_delay: Duration::from_millis(500),
            ..HostConfig::default()
        };
        let detector = Arc::new(ManualMarkerDetector::new());
        let host = SpectatorHost::new(config, Arc::new(MemoryTransport::new()), detector.clone());

        let outcome = host
            .spawn_discovery(CancellationToken::new(), vec![CoordinateId::new(9)])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome, DiscoveryOutcome::Completed);
        assert_eq!(detector.start_count(), 0);
        assert_eq!(
            host.coordinates().coordinate(CoordinateId::new(9)).unwrap().position(),
            Vector3::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_shutdown_cancels_open_discovery() {
        let transport = Arc::new(MemoryTransport::new());
        let detector = Arc::new(ManualMarkerDetector::new());
        let mut host = SpectatorHost::new(HostConfig::default(), transport, detector.clone());
        let token = CancellationToken::new();

        let discovery = host.spawn_discovery(token.clone(), Vec::new());
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            cancel.cancel();
        });

        let stats = host.run(token).await;
        assert!(stats.ticks > 100);
        assert_eq!(discovery.await.unwrap().unwrap(), DiscoveryOutcome::Cancelled);
        assert_eq!(detector.stop_count(), 1);
    }
}
