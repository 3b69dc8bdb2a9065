//! Transform component state
//!
//! Groups are encoded in bit order:
//! - `ACTIVE`: active (bool)
//! - `POSITION`: local position (3 x f32)
//! - `ROTATION`: local rotation (x, y, z, w as f32)
//! - `SCALE`: local scale (3 x f32)

use holosync_core::{ComponentId, HoloResult, Quaternion, ServiceId, Vector3};
use holosync_wire::{change_flags, ChangeFlags, MessageReader, MessageWriter};

use crate::{StateBroadcaster, StateSource, TrackedState};

/// Service tag for transform components
pub const TRANSFORM_SERVICE: ServiceId = ServiceId::new(*b"XFRM");

change_flags! {
    /// Field groups of a transform component
    pub struct TransformChangeFlags {
        const ACTIVE = 0b0000_0001;
        const POSITION = 0b0000_0010;
        const ROTATION = 0b0000_0100;
        const SCALE = 0b0000_1000;
    }
}

/// Local transform of a scene object
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformProperties {
    pub active: bool,
    pub position: Vector3,
    pub rotation: Quaternion,
    pub scale: Vector3,
}

impl Default for TransformProperties {
    fn default() -> Self {
        TransformProperties {
            active: true,
            position: Vector3::ZERO,
            rotation: Quaternion::IDENTITY,
            scale: Vector3::ONE,
        }
    }
}

impl TrackedState for TransformProperties {
    type Flags = TransformChangeFlags;

    const SERVICE: ServiceId = TRANSFORM_SERVICE;

    fn diff(&self, previous: &Self) -> TransformChangeFlags {
        let mut flags = TransformChangeFlags::NONE;
        if self.active != previous.active {
            flags |= TransformChangeFlags::ACTIVE;
        }
        if vector_bits(self.position) != vector_bits(previous.position) {
            flags |= TransformChangeFlags::POSITION;
        }
        if quaternion_bits(self.rotation) != quaternion_bits(previous.rotation) {
            flags |= TransformChangeFlags::ROTATION;
        }
        if vector_bits(self.scale) != vector_bits(previous.scale) {
            flags |= TransformChangeFlags::SCALE;
        }
        flags
    }

    fn encode(&self, flags: TransformChangeFlags, writer: &mut MessageWriter) {
        if flags.contains(TransformChangeFlags::ACTIVE) {
            writer.put_bool(self.active);
        }
        if flags.contains(TransformChangeFlags::POSITION) {
            writer.put_vector3(self.position);
        }
        if flags.contains(TransformChangeFlags::ROTATION) {
            writer.put_quaternion(self.rotation);
        }
        if flags.contains(TransformChangeFlags::SCALE) {
            writer.put_vector3(self.scale);
        }
    }

    fn decode(
        &mut self,
        flags: TransformChangeFlags,
        reader: &mut MessageReader<'_>,
    ) -> HoloResult<()> {
        if flags.contains(TransformChangeFlags::ACTIVE) {
            self.active = reader.read_bool()?;
        }
        if flags.contains(TransformChangeFlags::POSITION) {
            self.position = reader.read_vector3()?;
        }
        if flags.contains(TransformChangeFlags::ROTATION) {
            self.rotation = reader.read_quaternion()?;
        }
        if flags.contains(TransformChangeFlags::SCALE) {
            self.scale = reader.read_vector3()?;
        }
        Ok(())
    }
}

// Bitwise so a NaN the engine keeps reporting is not a change every tick
fn vector_bits(v: Vector3) -> [u32; 3] {
    [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
}

fn quaternion_bits(q: Quaternion) -> [u32; 4] {
    [q.x.to_bits(), q.y.to_bits(), q.z.to_bits(), q.w.to_bits()]
}

/// Broadcaster for a transform component
pub type TransformBroadcaster<Src> = StateBroadcaster<Src>;

/// Build a transform broadcaster over any transform state source
pub fn transform_broadcaster<Src>(component: ComponentId, source: Src) -> TransformBroadcaster<Src>
where
    Src: StateSource<State = TransformProperties>,
{
    StateBroadcaster::new(component, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComponentBroadcaster, FnSource, SharedState};
    use holosync_wire::{ComponentMessage, HEADER_SIZE};
    use proptest::prelude::*;

    #[test]
    fn test_only_moved_groups_are_flagged() {
        let state = SharedState::new(TransformProperties::default());
        let mut broadcaster = transform_broadcaster(ComponentId::new(1), state.clone());
        broadcaster.calculate_delta_changes();

        state.update(|t| {
            t.position = Vector3::new(0.0, 1.5, 0.0);
            t.scale = Vector3::new(2.0, 2.0, 2.0);
        });

        let flags = broadcaster.calculate_delta_changes();
        assert_eq!(flags, TransformChangeFlags::POSITION | TransformChangeFlags::SCALE);

        let message = broadcaster.encode_changes(flags);
        // flags + position + scale
        assert_eq!(message.len(), HEADER_SIZE + 1 + 12 + 12);
    }

    #[test]
    fn test_fn_source() {
        let mut broadcaster = transform_broadcaster(
            ComponentId::new(2),
            FnSource(|| TransformProperties {
                active: false,
                ..TransformProperties::default()
            }),
        );

        assert_eq!(broadcaster.calculate_delta_changes(), TransformChangeFlags::ALL);
        assert_eq!(broadcaster.snapshot().map(|t| t.active), Some(false));
    }

    #[test]
    fn test_nan_is_not_a_change_every_tick() {
        let state = SharedState::new(TransformProperties {
            position: Vector3::new(f32::NAN, 0.0, 0.0),
            rotation: Quaternion::new(0.0, 0.0, 0.0, f32::NAN),
            ..TransformProperties::default()
        });
        let mut broadcaster = transform_broadcaster(ComponentId::new(4), state.clone());

        assert_eq!(broadcaster.calculate_delta_changes(), TransformChangeFlags::ALL);
        assert!(broadcaster.calculate_delta_changes().is_none());
        assert!(broadcaster.calculate_delta_changes().is_none());

        state.update(|t| t.position = Vector3::ZERO);
        assert_eq!(broadcaster.calculate_delta_changes(), TransformChangeFlags::POSITION);
    }

    fn vector() -> impl Strategy<Value = Vector3> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0, -1000.0f32..1000.0)
            .prop_map(|(x, y, z)| Vector3::new(x, y, z))
    }

    proptest! {
        #[test]
        fn delta_applied_to_previous_reproduces_current(
            active in any::<bool>(),
            position in vector(),
            scale in vector(),
            yaw in -3.0f32..3.0,
        ) {
            let previous = TransformProperties::default();
            let current = TransformProperties {
                active,
                position,
                rotation: Quaternion::from_euler(yaw, 0.0, 0.0),
                scale,
            };

            let state = SharedState::new(previous);
            let mut broadcaster = transform_broadcaster(ComponentId::new(3), state.clone());
            broadcaster.calculate_delta_changes();
            state.set(current);

            let flags = broadcaster.calculate_delta_changes();
            let message = broadcaster.encode_changes(flags);
            let parsed = ComponentMessage::parse(&message).unwrap();
            let (decoded_flags, mut reader) = parsed.delta::<TransformChangeFlags>().unwrap();

            let mut mirrored = previous;
            mirrored.decode(decoded_flags, &mut reader).unwrap();
            prop_assert_eq!(mirrored, current);
            prop_assert_eq!(reader.remaining(), 0);
        }
    }
}
