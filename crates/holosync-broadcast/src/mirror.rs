//! Spectator-side application of component messages

use std::collections::HashMap;

use holosync_core::{ComponentId, HoloError, HoloResult, ServiceId};
use holosync_wire::{ChangeFlags, ComponentMessage, MessageCommand};

use crate::{MaskProperties, TrackedState, TransformProperties};

/// What an applied message did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorEvent {
    /// Groups in `flags` were overwritten
    Updated {
        service: ServiceId,
        component: ComponentId,
        flags: u8,
    },
    /// The component was dropped from the mirror
    Removed {
        service: ServiceId,
        component: ComponentId,
    },
}

/// Mirrored values of one component kind
#[derive(Debug)]
pub struct MirrorTable<S: TrackedState> {
    components: HashMap<ComponentId, S>,
    initial: S,
}

impl<S: TrackedState> MirrorTable<S> {
    /// Components first seen through a delta start from `initial`
    pub fn new(initial: S) -> Self {
        MirrorTable {
            components: HashMap::new(),
            initial,
        }
    }

    pub fn get(&self, component: ComponentId) -> Option<&S> {
        self.components.get(&component)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ComponentId, &S)> {
        self.components.iter()
    }

    /// Apply a message addressed to this kind
    ///
    /// A message that fails to decode leaves the mirrored value untouched.
    pub fn apply(&mut self, message: &ComponentMessage<'_>) -> HoloResult<MirrorEvent> {
        let service = message.header.service;
        let component = message.header.component;

        match message.header.command {
            MessageCommand::ComponentRemoved => {
                self.components.remove(&component);
                Ok(MirrorEvent::Removed { service, component })
            }
            MessageCommand::ComponentDelta => {
                let (flags, mut reader) = message.delta::<S::Flags>()?;
                let mut next = self
                    .components
                    .get(&component)
                    .copied()
                    .unwrap_or(self.initial);
                next.decode(flags, &mut reader)?;

                if reader.remaining() != 0 {
                    tracing::debug!(
                        service = %service,
                        component = %component,
                        trailing = reader.remaining(),
                        "Trailing bytes after component fields"
                    );
                }

                self.components.insert(component, next);
                Ok(MirrorEvent::Updated {
                    service,
                    component,
                    flags: flags.bits(),
                })
            }
        }
    }
}

/// Mirrored scene state on a spectator device
#[derive(Debug)]
pub struct SceneMirror {
    pub masks: MirrorTable<MaskProperties>,
    pub transforms: MirrorTable<TransformProperties>,
}

impl Default for SceneMirror {
    fn default() -> Self {
        SceneMirror {
            masks: MirrorTable::new(MaskProperties::default()),
            transforms: MirrorTable::new(TransformProperties::default()),
        }
    }
}

impl SceneMirror {
    pub fn new() -> Self {
        SceneMirror::default()
    }

    /// Decode one received buffer and route it by service tag
    pub fn apply(&mut self, bytes: &[u8]) -> HoloResult<MirrorEvent> {
        let message = ComponentMessage::parse(bytes)?;

        match message.header.service {
            s if s == MaskProperties::SERVICE => self.masks.apply(&message),
            s if s == TransformProperties::SERVICE => self.transforms.apply(&message),
            other => Err(HoloError::UnknownService(other)),
        }
    }
}
