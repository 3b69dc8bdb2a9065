//! Tracked state values and the sources they are read from

use std::sync::Arc;

use parking_lot::RwLock;

use holosync_core::{HoloResult, ServiceId};
use holosync_wire::{ChangeFlags, MessageReader, MessageWriter};

/// A plain value type whose field groups can be diffed and encoded
///
/// `encode` and `decode` must visit groups in ascending bit order and
/// write each group's fields in the same fixed order; the remote side has
/// no other way to find field boundaries.
pub trait TrackedState: Copy + PartialEq + Send + Sync + 'static {
    type Flags: ChangeFlags;

    /// Service that decodes this kind on the remote side
    const SERVICE: ServiceId;

    /// Groups whose fields differ between `self` and `previous`
    fn diff(&self, previous: &Self) -> Self::Flags;

    /// Write the groups named by `flags`
    fn encode(&self, flags: Self::Flags, writer: &mut MessageWriter);

    /// Overwrite the groups named by `flags` from a message body
    fn decode(&mut self, flags: Self::Flags, reader: &mut MessageReader<'_>) -> HoloResult<()>;
}

/// Where a broadcaster reads live state from
///
/// The host engine owns the real component; it only has to hand out the
/// current value when asked.
pub trait StateSource: Send + Sync {
    type State: TrackedState;

    fn current(&self) -> Self::State;
}

/// Thread-safe cell the host writes component state into
#[derive(Debug, Default)]
pub struct SharedState<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for SharedState<S> {
    fn clone(&self) -> Self {
        SharedState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Copy> SharedState<S> {
    pub fn new(initial: S) -> Self {
        SharedState {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn get(&self) -> S {
        *self.inner.read()
    }

    pub fn set(&self, value: S) {
        *self.inner.write() = value;
    }

    /// Mutate in place
    pub fn update(&self, f: impl FnOnce(&mut S)) {
        let mut guard = self.inner.write();
        f(&mut *guard);
    }
}

impl<S: TrackedState> StateSource for SharedState<S> {
    type State = S;

    fn current(&self) -> S {
        self.get()
    }
}

/// Adapter for closures reading engine state directly
pub struct FnSource<F>(pub F);

impl<S, F> StateSource for FnSource<F>
where
    S: TrackedState,
    F: Fn() -> S + Send + Sync,
{
    type State = S;

    fn current(&self) -> S {
        (self.0)()
    }
}
