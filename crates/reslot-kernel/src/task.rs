//! Task handles and spawn specifications.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::EventId;
use crate::fault::Fault;
use crate::sim::Sim;

/// Result of one task step or continuation.
pub type TaskResult = Result<(), Fault>;

/// Re-triggerable task body. Runs once per notification of any trigger.
pub type TaskFn = dyn FnMut(&mut Sim) -> TaskResult;

/// One-shot continuation body.
pub(crate) type ContFn = dyn FnOnce(&mut Sim) -> TaskResult;

/// Handle to a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) usize);

/// Description of a task to spawn: a name, the events it is sensitive to,
/// and whether it runs once immediately at spawn.
///
/// The body is shared behind `Rc` so the same spec can be spawned again
/// after a [`kill`](crate::Sim::kill) without resetting captured state.
#[derive(Clone)]
pub struct SpawnSpec {
    pub(crate) name: String,
    pub(crate) triggers: Vec<EventId>,
    pub(crate) initialize: bool,
    pub(crate) func: Rc<RefCell<Box<TaskFn>>>,
}

impl SpawnSpec {
    /// Creates a spec with no triggers that does not self-initialize.
    pub fn new(name: &str, func: impl FnMut(&mut Sim) -> TaskResult + 'static) -> Self {
        Self {
            name: name.to_owned(),
            triggers: Vec::new(),
            initialize: false,
            func: Rc::new(RefCell::new(Box::new(func))),
        }
    }

    /// Adds an event to the sensitivity list.
    pub fn sensitive_to(mut self, event: EventId) -> Self {
        self.triggers.push(event);
        self
    }

    /// Runs the body once at spawn time, before any trigger fires.
    pub fn initialize(mut self) -> Self {
        self.initialize = true;
        self
    }

    /// Task name, used in scheduler traces.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Scheduler-side state of one task.
pub(crate) struct TaskSlot {
    pub(crate) name: String,
    pub(crate) alive: bool,
    pub(crate) func: Rc<RefCell<Box<TaskFn>>>,
}
