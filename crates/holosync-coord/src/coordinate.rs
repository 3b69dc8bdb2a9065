//! Coordinates and the marker detections backing them

use std::collections::HashMap;

use holosync_core::{CoordinateId, HoloError, HoloResult, Pose, Quaternion, Vector3};

/// How a coordinate is currently backed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LocatedState {
    /// Requested but never observed
    #[default]
    Unresolved,
    /// Observed before, marker not visible in the latest batch
    Resolved,
    /// Marker visible in the latest batch
    Tracking,
}

impl LocatedState {
    #[inline]
    pub fn is_located(self) -> bool {
        self != LocatedState::Unresolved
    }
}

/// One detection of a physical marker, valid for a single batch
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub id: CoordinateId,
    pub position: Vector3,
    pub rotation: Quaternion,
}

impl Marker {
    pub fn new(id: CoordinateId, position: Vector3, rotation: Quaternion) -> Self {
        Marker {
            id,
            position,
            rotation,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

/// Markers visible in one detector report, keyed by id
pub type MarkerBatch = HashMap<CoordinateId, Marker>;

/// Build a batch from a list of detections
pub fn marker_batch(markers: impl IntoIterator<Item = Marker>) -> MarkerBatch {
    markers.into_iter().map(|m| (m.id, m)).collect()
}

/// A spatial reference point known to the coordinate service
#[derive(Clone, Debug, PartialEq)]
pub struct Coordinate {
    id: CoordinateId,
    pose: Pose,
    marker: Option<Marker>,
}

impl Coordinate {
    /// A coordinate always starts from an observed marker
    pub fn new(marker: Marker) -> Self {
        Coordinate {
            id: marker.id,
            pose: marker.pose(),
            marker: Some(marker),
        }
    }

    pub fn id(&self) -> CoordinateId {
        self.id
    }

    /// Last known pose, kept after the marker disappears
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Vector3 {
        self.pose.position
    }

    pub fn rotation(&self) -> Quaternion {
        self.pose.rotation
    }

    /// Marker from the latest batch, if it was visible
    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    pub fn state(&self) -> LocatedState {
        if self.marker.is_some() {
            LocatedState::Tracking
        } else {
            LocatedState::Resolved
        }
    }

    /// Back this coordinate with a fresh detection
    pub fn set_marker(&mut self, marker: Marker) -> HoloResult<()> {
        if marker.id != self.id {
            return Err(HoloError::MarkerIdMismatch {
                coordinate: self.id,
                marker: marker.id,
            });
        }

        self.pose = marker.pose();
        self.marker = Some(marker);
        Ok(())
    }

    /// The marker left view; the pose is retained
    pub fn clear_marker(&mut self) {
        self.marker = None;
    }
}
