//! Spatial math shared by coordinates and transform state
//!
//! Values compare with exact float equality. Change detection only needs to
//! know whether the engine reported a different value, not whether two poses
//! are perceptually close. Code that must treat NaN as unchanged compares
//! `to_bits()` instead.

/// 3D vector (engine units, meters)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const ONE: Vector3 = Vector3 {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_euler(yaw: f32, pitch: f32, roll: f32) -> Self {
        let cy = (yaw * 0.5).cos();
        let sy = (yaw * 0.5).sin();
        let cp = (pitch * 0.5).cos();
        let sp = (pitch * 0.5).sin();
        let cr = (roll * 0.5).cos();
        let sr = (roll * 0.5).sin();

        Self {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }
}

/// Position + orientation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    pub position: Vector3,
    pub rotation: Quaternion,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vector3::ZERO,
        rotation: Quaternion::IDENTITY,
    };

    pub fn new(position: Vector3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identity_defaults() {
        assert_eq!(Quaternion::default(), Quaternion::IDENTITY);
        assert_eq!(Pose::default(), Pose::IDENTITY);
    }

    #[test]
    fn test_from_euler_zero_is_identity() {
        assert_eq!(Quaternion::from_euler(0.0, 0.0, 0.0), Quaternion::IDENTITY);
    }

    proptest! {
        #[test]
        fn prop_from_euler_is_unit(
            yaw in -6.3f32..6.3,
            pitch in -6.3f32..6.3,
            roll in -6.3f32..6.3,
        ) {
            let q = Quaternion::from_euler(yaw, pitch, roll);
            let len = (q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w).sqrt();
            prop_assert!((len - 1.0).abs() < 1e-4);
        }
    }
}
