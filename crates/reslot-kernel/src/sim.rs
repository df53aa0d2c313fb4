//! The cooperative scheduler.
//!
//! A [`Sim`] owns the clock, the event and task arenas, and one priority
//! queue of pending work ordered by `(time, sequence)`. The sequence number
//! makes same-instant ordering stable: items scheduled first run first, and
//! a zero-delay [`notify`](Sim::notify) delivers *after* everything already
//! queued at the current instant. That is the delta-cycle discipline the
//! reconfiguration protocol leans on: "couple, then synchronize on the next
//! scheduling step" works because the synchronize step is queued behind the
//! couple step.
//!
//! Everything is single-threaded. Tasks run to completion and hand control
//! back by returning; there are no suspension points inside a task body.
//! The first [`Fault`](crate::Fault) returned by any body aborts the run.

use std::any::Any;
use std::cell::Cell;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::clock::SimClock;
use crate::event::{EventId, EventSlot};
use crate::task::{ContFn, SpawnSpec, TaskId, TaskResult, TaskSlot};

enum Pending {
    /// Deliver an event: queue its subscribers, drain its waiters.
    Notify(EventId),
    /// Run a one-shot continuation.
    Continuation(Box<ContFn>),
    /// Step a task (skipped silently if the task was killed meanwhile).
    Step(TaskId),
}

struct Scheduled {
    time_ns: u64,
    seq: u64,
    what: Pending,
}

impl Scheduled {
    fn key(&self) -> (u64, u64) {
        (self.time_ns, self.seq)
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for earliest-first.
        other.key().cmp(&self.key())
    }
}

/// The simulation: clock, arenas, and the pending-work queue.
pub struct Sim {
    clock: SimClock,
    next_seq: u64,
    queue: BinaryHeap<Scheduled>,
    events: Vec<EventSlot>,
    tasks: Vec<TaskSlot>,
    /// Typed arenas behind `Any`: each entry is a `SignalSlot<T>` or a
    /// `CallSlot<Req, Resp>`, addressed by the index in its handle.
    pub(crate) signals: Vec<Box<dyn Any>>,
    pub(crate) channels: Vec<Box<dyn Any>>,
    start_hooks: Vec<Box<ContFn>>,
    running: bool,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            next_seq: 0,
            queue: BinaryHeap::new(),
            events: Vec::new(),
            tasks: Vec::new(),
            signals: Vec::new(),
            channels: Vec::new(),
            start_hooks: Vec::new(),
            running: false,
        }
    }

    /// Current simulated time in nanoseconds.
    #[inline]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// True once [`run`](Sim::run) or [`run_for`](Sim::run_for) has been
    /// entered for the first time. Distinguishes elaboration (wiring the
    /// design up) from simulation time.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Allocates a new event. The name appears in scheduler traces.
    pub fn new_event(&mut self, name: &str) -> EventId {
        let id = EventId(self.events.len());
        self.events.push(EventSlot::new(name.to_owned()));
        id
    }

    /// Schedules delivery of `event` at the current instant, after
    /// everything already queued there.
    pub fn notify(&mut self, event: EventId) {
        self.push(self.now(), Pending::Notify(event));
    }

    /// Schedules delivery of `event` after `delay_ns` nanoseconds.
    pub fn notify_in(&mut self, event: EventId, delay_ns: u64) {
        self.push(self.now() + delay_ns, Pending::Notify(event));
    }

    /// Registers a one-shot continuation for the next delivery of `event`.
    pub fn on_next(&mut self, event: EventId, f: impl FnOnce(&mut Sim) -> TaskResult + 'static) {
        self.events[event.0].waiters.push(Box::new(f));
    }

    /// Runs `f` once every event in `events` has fired at least once.
    ///
    /// With an empty list `f` runs on the next scheduling step.
    pub fn wait_all(
        &mut self,
        events: &[EventId],
        f: impl FnOnce(&mut Sim) -> TaskResult + 'static,
    ) {
        if events.is_empty() {
            self.call_soon(f);
            return;
        }
        let remaining = Rc::new(Cell::new(events.len()));
        let action: Rc<RefCell<Option<Box<ContFn>>>> = Rc::new(RefCell::new(Some(Box::new(f))));
        for &event in events {
            let remaining = Rc::clone(&remaining);
            let action = Rc::clone(&action);
            self.on_next(event, move |sim| {
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    if let Some(f) = action.borrow_mut().take() {
                        return f(sim);
                    }
                }
                Ok(())
            });
        }
    }

    // ========================================================================
    // Continuations
    // ========================================================================

    /// Schedules `f` to run at the current instant, after everything
    /// already queued there.
    pub fn call_soon(&mut self, f: impl FnOnce(&mut Sim) -> TaskResult + 'static) {
        self.push(self.now(), Pending::Continuation(Box::new(f)));
    }

    /// Schedules `f` to run after `delay_ns` nanoseconds.
    pub fn call_in(&mut self, delay_ns: u64, f: impl FnOnce(&mut Sim) -> TaskResult + 'static) {
        self.push(self.now() + delay_ns, Pending::Continuation(Box::new(f)));
    }

    /// Registers a hook that runs when the simulation starts, before the
    /// first queued item. Used for end-of-elaboration work.
    ///
    /// # Panics
    ///
    /// Panics if the simulation has already started.
    pub fn at_start(&mut self, f: impl FnOnce(&mut Sim) -> TaskResult + 'static) {
        assert!(
            !self.running,
            "start hook registered after simulation start"
        );
        self.start_hooks.push(Box::new(f));
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Spawns a task: subscribes it to its triggers and, when `initialize`
    /// is set, queues one initial step at the current instant.
    pub fn spawn(&mut self, spec: SpawnSpec) -> TaskId {
        let id = TaskId(self.tasks.len());
        trace!(task = %spec.name, triggers = spec.triggers.len(), "spawn");
        for &event in &spec.triggers {
            self.events[event.0].subscribers.push(id);
        }
        let initialize = spec.initialize;
        self.tasks.push(TaskSlot {
            name: spec.name,
            alive: true,
            func: spec.func,
        });
        if initialize {
            self.push(self.now(), Pending::Step(id));
        }
        id
    }

    /// Kills a task. Already-queued steps are dropped on delivery and the
    /// task is pruned from sensitivity lists on the next notification.
    pub fn kill(&mut self, task: TaskId) {
        if let Some(slot) = self.tasks.get_mut(task.0) {
            trace!(task = %slot.name, "kill");
            slot.alive = false;
        }
    }

    /// True while the task has not been killed.
    pub fn is_alive(&self, task: TaskId) -> bool {
        self.tasks.get(task.0).is_some_and(|slot| slot.alive)
    }

    // ========================================================================
    // Run loop
    // ========================================================================

    /// Drains the queue to exhaustion. Returns the first fault raised.
    pub fn run(&mut self) -> TaskResult {
        self.start()?;
        while let Some(item) = self.queue.pop() {
            self.clock.advance_to(item.time_ns);
            self.dispatch(item.what)?;
        }
        Ok(())
    }

    /// Runs everything scheduled within the next `delta_ns` nanoseconds,
    /// then advances the clock to the window's end.
    pub fn run_for(&mut self, delta_ns: u64) -> TaskResult {
        let deadline = self.now() + delta_ns;
        self.start()?;
        while let Some(next_ns) = self.queue.peek().map(|item| item.time_ns) {
            if next_ns > deadline {
                break;
            }
            let Some(item) = self.queue.pop() else { break };
            self.clock.advance_to(item.time_ns);
            self.dispatch(item.what)?;
        }
        self.clock.advance_to(deadline);
        Ok(())
    }

    fn start(&mut self) -> TaskResult {
        if !self.running {
            self.running = true;
            for hook in mem::take(&mut self.start_hooks) {
                hook(self)?;
            }
        }
        Ok(())
    }

    fn push(&mut self, time_ns: u64, what: Pending) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled { time_ns, seq, what });
    }

    fn dispatch(&mut self, pending: Pending) -> TaskResult {
        match pending {
            Pending::Continuation(f) => f(self),
            Pending::Step(task) => self.step_task(task),
            Pending::Notify(event) => self.deliver(event),
        }
    }

    fn deliver(&mut self, event: EventId) -> TaskResult {
        let waiters = {
            let slot = &mut self.events[event.0];
            trace!(event = %slot.name, "notify");
            mem::take(&mut slot.waiters)
        };
        // Prune killed subscribers, then queue the survivors as same-instant
        // steps. The pruned list is written back before the waiters run so a
        // waiter can subscribe a fresh task without it being clobbered.
        let subscribed = self.events[event.0].subscribers.clone();
        let live: Vec<TaskId> = subscribed
            .into_iter()
            .filter(|&task| self.is_alive(task))
            .collect();
        self.events[event.0].subscribers.clone_from(&live);
        for task in live {
            self.push(self.now(), Pending::Step(task));
        }
        for waiter in waiters {
            waiter(self)?;
        }
        Ok(())
    }

    fn step_task(&mut self, task: TaskId) -> TaskResult {
        let func = {
            let slot = &self.tasks[task.0];
            if !slot.alive {
                return Ok(());
            }
            trace!(task = %slot.name, "step");
            Rc::clone(&slot.func)
        };
        let mut body = func.borrow_mut();
        (&mut **body)(self)
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}
