#![no_main]

use arbitrary::Arbitrary;
use holosync_broadcast::{
    transform_broadcaster, ComponentBroadcaster, SceneMirror, SharedState, TransformProperties,
};
use holosync_core::{ComponentId, Quaternion, Vector3};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    SetActive(bool),
    Move([f32; 3]),
    Rotate([f32; 4]),
    Scale([f32; 3]),
    Tick,
}

fuzz_target!(|ops: Vec<Op>| {
    let component = ComponentId::new(1);
    let state = SharedState::new(TransformProperties::default());
    let mut broadcaster = transform_broadcaster(component, state.clone());
    let mut mirror = SceneMirror::new();

    let complete = broadcaster.encode_changes(broadcaster.calculate_delta_changes());
    mirror.apply(&complete).expect("complete state applies");

    for op in ops {
        match op {
            Op::SetActive(active) => state.update(|t| t.active = active),
            Op::Move([x, y, z]) => state.update(|t| t.position = Vector3::new(x, y, z)),
            Op::Rotate([x, y, z, w]) => state.update(|t| t.rotation = Quaternion::new(x, y, z, w)),
            Op::Scale([x, y, z]) => state.update(|t| t.scale = Vector3::new(x, y, z)),
            Op::Tick => {
                let flags = broadcaster.calculate_delta_changes();
                if broadcaster.has_changes(flags) {
                    let message = broadcaster.encode_changes(flags);
                    mirror.apply(&message).expect("delta applies");
                }

                let mirrored = mirror.transforms.get(component).copied();
                match (mirrored, broadcaster.snapshot()) {
                    (Some(a), Some(b)) => assert!(same(&a, &b), "{:?} != {:?}", a, b),
                    (a, b) => assert_eq!(a.is_some(), b.is_some()),
                }
            }
        }
    }
});

// NaN never compares equal; a resent NaN must still count as a match
fn same_f32(a: f32, b: f32) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn same(a: &TransformProperties, b: &TransformProperties) -> bool {
    let va = [
        a.position.x, a.position.y, a.position.z,
        a.rotation.x, a.rotation.y, a.rotation.z, a.rotation.w,
        a.scale.x, a.scale.y, a.scale.z,
    ];
    let vb = [
        b.position.x, b.position.y, b.position.z,
        b.rotation.x, b.rotation.y, b.rotation.z, b.rotation.w,
        b.scale.x, b.scale.y, b.scale.z,
    ];
    a.active == b.active && va.iter().zip(vb.iter()).all(|(x, y)| same_f32(*x, *y))
}
