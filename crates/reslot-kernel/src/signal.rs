//! Typed value signals.
//!
//! A signal holds one value of type `T` and owns a `changed` event that
//! fires only when a write actually alters the value. `T::default()` is the
//! signal's idle value: the value it starts with and the value decoupled
//! drivers fall back to. Any number of writers may share a signal.

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::event::EventId;
use crate::sim::Sim;

/// Bound on values carried by signals and call channels.
///
/// `Default` supplies the idle value, `PartialEq` suppresses no-change
/// writes, `Debug` feeds the scheduler traces.
pub trait ChannelValue: Clone + Default + PartialEq + fmt::Debug + 'static {}

impl<T: Clone + Default + PartialEq + fmt::Debug + 'static> ChannelValue for T {}

pub(crate) struct SignalSlot<T> {
    pub(crate) name: String,
    pub(crate) value: T,
}

/// Handle to a signal owned by a [`Sim`].
///
/// Copyable index handle; all state lives in the simulation's arena.
pub struct Signal<T> {
    index: usize,
    changed: EventId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("index", &self.index).finish()
    }
}

impl<T: ChannelValue> Signal<T> {
    /// Allocates a signal starting at `T::default()`.
    pub fn new(sim: &mut Sim, name: &str) -> Self {
        let changed = sim.new_event(&format!("{name}.changed"));
        let index = sim.signals.len();
        sim.signals.push(Box::new(SignalSlot {
            name: name.to_owned(),
            value: T::default(),
        }));
        Self {
            index,
            changed,
            _marker: PhantomData,
        }
    }

    /// The event fired whenever the value changes.
    #[inline]
    pub fn changed(&self) -> EventId {
        self.changed
    }

    /// Returns a copy of the current value.
    pub fn read(&self, sim: &Sim) -> T {
        self.slot(sim).value.clone()
    }

    /// Writes `value`, firing `changed` only if it differs from the
    /// current value.
    pub fn write(&self, sim: &mut Sim, value: T) {
        let altered = {
            let slot = self.slot_mut(sim);
            if slot.value == value {
                false
            } else {
                trace!(signal = %slot.name, value = ?value, "write");
                slot.value = value;
                true
            }
        };
        if altered {
            sim.notify(self.changed);
        }
    }

    fn slot<'a>(&self, sim: &'a Sim) -> &'a SignalSlot<T> {
        match sim.signals[self.index].downcast_ref() {
            Some(slot) => slot,
            None => panic!("signal handle used with the wrong value type"),
        }
    }

    fn slot_mut<'a>(&self, sim: &'a mut Sim) -> &'a mut SignalSlot<T> {
        match sim.signals[self.index].downcast_mut() {
            Some(slot) => slot,
            None => panic!("signal handle used with the wrong value type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn starts_at_the_idle_value() {
        let mut sim = Sim::new();
        let signal = Signal::<u32>::new(&mut sim, "s");
        assert_eq!(signal.read(&sim), 0);
    }

    #[test]
    fn write_fires_changed_only_on_change() {
        let mut sim = Sim::new();
        let signal = Signal::<u32>::new(&mut sim, "s");
        let fired = Rc::new(Cell::new(0u32));
        let fired2 = Rc::clone(&fired);
        sim.spawn(
            crate::SpawnSpec::new("watch", move |_| {
                fired2.set(fired2.get() + 1);
                Ok(())
            })
            .sensitive_to(signal.changed()),
        );

        signal.write(&mut sim, 7);
        sim.run().unwrap();
        assert_eq!(fired.get(), 1);

        signal.write(&mut sim, 7);
        sim.run().unwrap();
        assert_eq!(fired.get(), 1);

        signal.write(&mut sim, 8);
        sim.run().unwrap();
        assert_eq!(fired.get(), 2);
        assert_eq!(signal.read(&sim), 8);
    }

    #[test]
    fn handles_are_copyable() {
        let mut sim = Sim::new();
        let signal = Signal::<i64>::new(&mut sim, "s");
        let alias = signal;
        alias.write(&mut sim, -3);
        assert_eq!(signal.read(&sim), -3);
    }

    #[test]
    #[should_panic(expected = "signal handle used with the wrong value type")]
    fn type_confusion_panics() {
        let mut sim = Sim::new();
        let a = Signal::<u32>::new(&mut sim, "a");
        // Forge a handle with the same index but a different type.
        let forged = Signal::<String> {
            index: 0,
            changed: a.changed(),
            _marker: PhantomData,
        };
        let _ = forged.read(&sim);
    }
}
