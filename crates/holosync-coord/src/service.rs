//! Spatial coordinate service
//!
//! Marker reports are applied by a single writer: detector callbacks only
//! enqueue batches, and every registry mutation happens under the writer
//! lock while the registry itself is write-locked. New-coordinate
//! notifications go out after the registry lock is released, so anything
//! reacting to them sees the whole batch applied.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use holosync_core::{CoordinateId, HoloError, HoloResult, Quaternion, Vector3};

use crate::{Coordinate, LocatedState, Marker, MarkerBatch, MarkerDetector, MarkerSink, Subscription};

/// Interval between checks during targeted discovery
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long simulated discovery waits before fabricating a coordinate
pub const DEFAULT_SIMULATION_DELAY: Duration = Duration::from_secs(3);

/// Buffered new-coordinate notifications per subscriber
const DISCOVERED_CHANNEL_CAPACITY: usize = 64;

/// Where discovered coordinates come from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Drive the injected marker detector
    Detector,
    /// Fabricate one coordinate at the origin after `delay`, for development
    /// without physical markers
    Simulated { delay: Duration },
}

/// Coordinate service configuration
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    pub poll_interval: Duration,
    pub mode: DiscoveryMode,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            mode: DiscoveryMode::Detector,
        }
    }
}

/// How a discovery run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Every requested coordinate is located
    Completed,
    /// The token was cancelled first
    Cancelled,
    /// Simulated discovery was asked for something other than one id
    Skipped,
}

/// What one reconciliation pass did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub discovered: usize,
    pub updated: usize,
    pub retired: usize,
    pub rejected: usize,
}

impl ReconcileSummary {
    fn absorb(&mut self, other: ReconcileSummary) {
        self.discovered += other.discovered;
        self.updated += other.updated;
        self.retired += other.retired;
        self.rejected += other.rejected;
    }
}

/// Stops the detector when dropped, whichever way discovery exits
struct DetectorSession<'a> {
    detector: &'a dyn MarkerDetector,
}

impl<'a> DetectorSession<'a> {
    fn start(detector: &'a dyn MarkerDetector) -> HoloResult<Self> {
        detector.start_detecting()?;
        tracing::debug!("Marker detector started");
        Ok(DetectorSession { detector })
    }
}

impl Drop for DetectorSession<'_> {
    fn drop(&mut self) {
        match self.detector.stop_detecting() {
            Ok(()) => tracing::debug!("Marker detector stopped"),
            Err(e) => tracing::warn!("Failed to stop marker detector: {}", e),
        }
    }
}

/// Registry of known coordinates fed by a marker detector
pub struct SpatialCoordinateService {
    detector: Arc<dyn MarkerDetector>,
    config: DiscoveryConfig,
    registry: RwLock<HashMap<CoordinateId, Coordinate>>,
    sink: MarkerSink,
    /// Pending reports; holding this lock makes the caller the writer
    pending: Mutex<mpsc::UnboundedReceiver<MarkerBatch>>,
    discovered: broadcast::Sender<Coordinate>,
    subscription: Mutex<Option<Subscription>>,
    disposed: AtomicBool,
}

impl SpatialCoordinateService {
    pub fn new(detector: Arc<dyn MarkerDetector>, config: DiscoveryConfig) -> Self {
        let (sink, pending) = mpsc::unbounded_channel();
        let (discovered, _) = broadcast::channel(DISCOVERED_CHANNEL_CAPACITY);
        let subscription = detector.subscribe(sink.clone());

        SpatialCoordinateService {
            detector,
            config,
            registry: RwLock::new(HashMap::new()),
            sink,
            pending: Mutex::new(pending),
            discovered,
            subscription: Mutex::new(Some(subscription)),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Notifications for each newly discovered coordinate
    pub fn subscribe_discovered(&self) -> broadcast::Receiver<Coordinate> {
        self.discovered.subscribe()
    }

    /// Sink for hosts that report markers without going through the detector
    pub fn marker_sink(&self) -> MarkerSink {
        self.sink.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Detach from the detector; later reports are dropped
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }

        let mut pending = self.pending.lock();
        let mut dropped = 0;
        while pending.try_recv().is_ok() {
            dropped += 1;
        }
        tracing::info!(dropped_reports = dropped, "Coordinate service disposed");
    }

    /// Apply every queued detector report, in arrival order
    pub fn process_pending_updates(&self) -> ReconcileSummary {
        let mut pending = self.pending.lock();
        self.drain(&mut pending)
    }

    /// Apply one report of the currently visible markers
    ///
    /// Reports already queued are older, so they are applied first.
    pub fn on_markers_updated(&self, batch: MarkerBatch) -> ReconcileSummary {
        let mut pending = self.pending.lock();
        let mut total = self.drain(&mut pending);
        total.absorb(self.reconcile(batch));
        total
    }

    fn drain(&self, pending: &mut mpsc::UnboundedReceiver<MarkerBatch>) -> ReconcileSummary {
        let mut total = ReconcileSummary::default();
        while let Ok(batch) = pending.try_recv() {
            total.absorb(self.reconcile(batch));
        }
        total
    }

    /// Caller must hold the writer lock (`pending`)
    fn reconcile(&self, batch: MarkerBatch) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        if self.is_disposed() {
            tracing::debug!(markers = batch.len(), "Marker report after dispose ignored");
            return summary;
        }

        let mut staged = Vec::new();
        {
            let mut registry = self.registry.write();
            let mut seen = HashSet::with_capacity(batch.len());

            for (id, marker) in batch {
                match registry.get_mut(&id) {
                    Some(coordinate) => match coordinate.set_marker(marker) {
                        Ok(()) => {
                            seen.insert(id);
                            summary.updated += 1;
                        }
                        Err(e) => {
                            tracing::warn!("Rejected marker report: {}", e);
                            summary.rejected += 1;
                        }
                    },
                    None if marker.id != id => {
                        tracing::warn!(key = %id, marker = %marker.id, "Marker keyed under wrong id");
                        summary.rejected += 1;
                    }
                    None => {
                        seen.insert(id);
                        staged.push(Coordinate::new(marker));
                    }
                }
            }

            for (id, coordinate) in registry.iter_mut() {
                if !seen.contains(id) && coordinate.marker().is_some() {
                    coordinate.clear_marker();
                    summary.retired += 1;
                }
            }

            for coordinate in &staged {
                registry.insert(coordinate.id(), coordinate.clone());
            }
        }

        for coordinate in staged {
            tracing::info!(coordinate = %coordinate.id(), "New coordinate discovered");
            summary.discovered += 1;
            // No receivers is fine
            let _ = self.discovered.send(coordinate);
        }

        tracing::trace!(
            discovered = summary.discovered,
            updated = summary.updated,
            retired = summary.retired,
            "Marker report reconciled"
        );
        summary
    }

    pub fn coordinate(&self, id: CoordinateId) -> Option<Coordinate> {
        self.registry.read().get(&id).cloned()
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut all: Vec<Coordinate> = self.registry.read().values().cloned().collect();
        all.sort_by_key(|c| c.id());
        all
    }

    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    /// `Unresolved` for ids never seen
    pub fn located_state(&self, id: CoordinateId) -> LocatedState {
        self.registry
            .read()
            .get(&id)
            .map(|c| c.state())
            .unwrap_or(LocatedState::Unresolved)
    }

    /// True when every id is known and located
    pub fn all_located(&self, ids: &[CoordinateId]) -> bool {
        let registry = self.registry.read();
        ids.iter()
            .all(|id| registry.get(id).map_or(false, |c| c.state().is_located()))
    }

    /// Run discovery until `ids` are all located, or until cancelled when
    /// `ids` is empty
    ///
    /// The detector runs for the whole call and is stopped exactly once on
    /// return, on error, and if the future is dropped.
    pub async fn discover_coordinates(
        &self,
        token: CancellationToken,
        ids: &[CoordinateId],
    ) -> HoloResult<DiscoveryOutcome> {
        if self.is_disposed() {
            return Err(HoloError::ServiceDisposed);
        }

        if let DiscoveryMode::Simulated { delay } = self.config.mode {
            return self.simulate_discovery(token, ids, delay).await;
        }

        let _session = DetectorSession::start(self.detector.as_ref())?;
        tracing::info!(requested = ids.len(), "Coordinate discovery started");

        loop {
            self.process_pending_updates();

            if self.is_disposed() {
                return Err(HoloError::ServiceDisposed);
            }

            if !ids.is_empty() && self.all_located(ids) {
                tracing::info!(requested = ids.len(), "Requested coordinates located");
                return Ok(DiscoveryOutcome::Completed);
            }

            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    tracing::info!("Coordinate discovery cancelled");
                    return Ok(DiscoveryOutcome::Cancelled);
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    async fn simulate_discovery(
        &self,
        token: CancellationToken,
        ids: &[CoordinateId],
        delay: Duration,
    ) -> HoloResult<DiscoveryOutcome> {
        let [id] = ids else {
            tracing::warn!(
                requested = ids.len(),
                "Simulated discovery supports exactly one coordinate id"
            );
            return Ok(DiscoveryOutcome::Skipped);
        };

        tokio::select! {
            biased;

            _ = token.cancelled() => return Ok(DiscoveryOutcome::Cancelled),

            _ = tokio::time::sleep(delay) => {}
        }

        let marker = Marker::new(*id, Vector3::ZERO, Quaternion::IDENTITY);
        let _writer = self.pending.lock();
        if self.is_disposed() {
            return Err(HoloError::ServiceDisposed);
        }

        let created = {
            let mut registry = self.registry.write();
            match registry.get_mut(id) {
                Some(coordinate) => {
                    coordinate.set_marker(marker)?;
                    None
                }
                None => {
                    let coordinate = Coordinate::new(marker);
                    registry.insert(*id, coordinate.clone());
                    Some(coordinate)
                }
            }
        };

        if let Some(coordinate) = created {
            tracing::info!(coordinate = %id, "Simulated coordinate registered");
            let _ = self.discovered.send(coordinate);
        }
        Ok(DiscoveryOutcome::Completed)
    }
}
