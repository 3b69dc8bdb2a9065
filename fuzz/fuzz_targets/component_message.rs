#![no_main]

use holosync_broadcast::SceneMirror;
use holosync_wire::{ComponentMessage, HEADER_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let parsed = ComponentMessage::parse(data);

    // Headers reserialize byte for byte
    if let Ok(message) = &parsed {
        assert_eq!(&data[..HEADER_SIZE], &message.header.to_bytes()[..]);
    }

    // Never panics; unparseable input is always an error
    let mut mirror = SceneMirror::new();
    let applied = mirror.apply(data);
    if parsed.is_err() {
        assert!(applied.is_err());
    }
});
