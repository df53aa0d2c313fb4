//! Event handles and their scheduler-side state.

use crate::task::{ContFn, TaskId};

/// Handle to an event owned by a [`Sim`](crate::Sim).
///
/// Events are created with [`Sim::new_event`](crate::Sim::new_event) and
/// never deallocated; the handle is a plain index and stays valid for the
/// life of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub(crate) usize);

/// Scheduler-side state of one event.
pub(crate) struct EventSlot {
    pub(crate) name: String,
    /// Tasks re-triggered on every notification (sensitivity list).
    pub(crate) subscribers: Vec<TaskId>,
    /// One-shot continuations consumed by the next notification.
    pub(crate) waiters: Vec<Box<ContFn>>,
}

impl EventSlot {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            subscribers: Vec::new(),
            waiters: Vec::new(),
        }
    }
}
