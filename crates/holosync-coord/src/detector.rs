//! Marker detector surface
//!
//! A detector pushes every visible-marker report into the sink of its one
//! active subscriber. Reports may arrive from any thread; the sink is a
//! channel so the coordinate service can apply them on its own schedule.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use holosync_core::{HoloError, HoloResult};

use crate::MarkerBatch;

/// Where a detector delivers marker reports
pub type MarkerSink = mpsc::UnboundedSender<MarkerBatch>;

/// Source of marker detections (camera pipeline, fiducial tracker, ...)
pub trait MarkerDetector: Send + Sync {
    fn start_detecting(&self) -> HoloResult<()>;

    fn stop_detecting(&self) -> HoloResult<()>;

    /// Route reports to `sink`, replacing any previous subscriber
    fn subscribe(&self, sink: MarkerSink) -> Subscription;
}

/// Active subscription; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[derive(Default)]
struct ManualState {
    subscriber: Option<(u64, MarkerSink)>,
    next_subscriber: u64,
    detecting: bool,
    starts: usize,
    stops: usize,
    fail_next_start: Option<String>,
}

/// Detector fed programmatically
///
/// Hosts whose tracking pipeline lives outside Rust call `report` with each
/// visible set. Reports are forwarded only while detection is running.
#[derive(Clone, Default)]
pub struct ManualMarkerDetector {
    state: Arc<Mutex<ManualState>>,
}

impl ManualMarkerDetector {
    pub fn new() -> Self {
        ManualMarkerDetector::default()
    }

    /// Forward a report to the subscriber; false if it was not delivered
    pub fn report(&self, batch: MarkerBatch) -> bool {
        let state = self.state.lock();
        if !state.detecting {
            tracing::debug!(markers = batch.len(), "Report while not detecting dropped");
            return false;
        }

        match &state.subscriber {
            Some((_, sink)) => sink.send(batch).is_ok(),
            None => false,
        }
    }

    pub fn is_detecting(&self) -> bool {
        self.state.lock().detecting
    }

    pub fn has_subscriber(&self) -> bool {
        self.state.lock().subscriber.is_some()
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().starts
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stops
    }

    /// Make the next `start_detecting` fail with `reason`
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_start = Some(reason.into());
    }
}

impl MarkerDetector for ManualMarkerDetector {
    fn start_detecting(&self) -> HoloResult<()> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next_start.take() {
            return Err(HoloError::DetectorError(reason));
        }

        state.starts += 1;
        state.detecting = true;
        Ok(())
    }

    fn stop_detecting(&self) -> HoloResult<()> {
        let mut state = self.state.lock();
        state.stops += 1;
        state.detecting = false;
        Ok(())
    }

    fn subscribe(&self, sink: MarkerSink) -> Subscription {
        let token = {
            let mut state = self.state.lock();
            state.next_subscriber += 1;
            let token = state.next_subscriber;
            state.subscriber = Some((token, sink));
            token
        };

        let weak: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.lock();
                if matches!(state.subscriber, Some((current, _)) if current == token) {
                    state.subscriber = None;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marker_batch, Marker};
    use holosync_core::{CoordinateId, Quaternion, Vector3};

    fn batch(id: i32) -> MarkerBatch {
        marker_batch([Marker::new(
            CoordinateId::new(id),
            Vector3::ZERO,
            Quaternion::IDENTITY,
        )])
    }

    #[test]
    fn test_reports_only_while_detecting() {
        let detector = ManualMarkerDetector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = detector.subscribe(tx);

        assert!(!detector.report(batch(1)));

        detector.start_detecting().unwrap();
        assert!(detector.report(batch(1)));
        assert_eq!(rx.try_recv().unwrap().len(), 1);

        detector.stop_detecting().unwrap();
        assert!(!detector.report(batch(1)));
        assert_eq!((detector.start_count(), detector.stop_count()), (1, 1));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let detector = ManualMarkerDetector::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let subscription = detector.subscribe(tx);
        assert!(detector.has_subscriber());

        drop(subscription);
        assert!(!detector.has_subscriber());
    }

    #[test]
    fn test_stale_subscription_keeps_newer_subscriber() {
        let detector = ManualMarkerDetector::new();
        let (first_tx, _first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();

        let first = detector.subscribe(first_tx);
        let _second = detector.subscribe(second_tx);
        first.unsubscribe();
        assert!(detector.has_subscriber());

        detector.start_detecting().unwrap();
        assert!(detector.report(batch(7)));
        assert!(second_rx.try_recv().is_ok());
    }

    #[test]
    fn test_failed_start() {
        let detector = ManualMarkerDetector::new();
        detector.fail_next_start("camera busy");

        assert!(matches!(
            detector.start_detecting(),
            Err(HoloError::DetectorError(reason)) if reason == "camera busy"
        ));
        assert!(!detector.is_detecting());
        assert!(detector.start_detecting().is_ok());
    }
}
