//! Mask component state
//!
//! Wire layout for `PROPERTIES`: `enabled` (bool), `show_mask_graphic` (bool).

use holosync_core::{ComponentId, HoloResult, ServiceId};
use holosync_wire::{change_flags, ChangeFlags, MessageReader, MessageWriter};

use crate::{StateBroadcaster, StateSource, TrackedState};

/// Service tag for mask components
pub const MASK_SERVICE: ServiceId = ServiceId::new(*b"MASK");

change_flags! {
    /// Field groups of a mask component
    pub struct MaskChangeFlags {
        const PROPERTIES = 0b0000_0001;
    }
}

/// Observable state of a UI mask
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskProperties {
    pub enabled: bool,
    pub show_mask_graphic: bool,
}

impl Default for MaskProperties {
    fn default() -> Self {
        MaskProperties {
            enabled: true,
            show_mask_graphic: true,
        }
    }
}

impl MaskProperties {
    pub fn new(enabled: bool, show_mask_graphic: bool) -> Self {
        MaskProperties {
            enabled,
            show_mask_graphic,
        }
    }
}

impl TrackedState for MaskProperties {
    type Flags = MaskChangeFlags;

    const SERVICE: ServiceId = MASK_SERVICE;

    fn diff(&self, previous: &Self) -> MaskChangeFlags {
        if self != previous {
            MaskChangeFlags::PROPERTIES
        } else {
            MaskChangeFlags::NONE
        }
    }

    fn encode(&self, flags: MaskChangeFlags, writer: &mut MessageWriter) {
        if flags.contains(MaskChangeFlags::PROPERTIES) {
            writer.put_bool(self.enabled);
            writer.put_bool(self.show_mask_graphic);
        }
    }

    fn decode(&mut self, flags: MaskChangeFlags, reader: &mut MessageReader<'_>) -> HoloResult<()> {
        if flags.contains(MaskChangeFlags::PROPERTIES) {
            self.enabled = reader.read_bool()?;
            self.show_mask_graphic = reader.read_bool()?;
        }
        Ok(())
    }
}

/// Broadcaster for a mask component
pub type MaskBroadcaster<Src> = StateBroadcaster<Src>;

/// Build a mask broadcaster over any mask state source
pub fn mask_broadcaster<Src>(component: ComponentId, source: Src) -> MaskBroadcaster<Src>
where
    Src: StateSource<State = MaskProperties>,
{
    StateBroadcaster::new(component, source)
}
