//! Output mirroring: the module produces a value, the external world must
//! see it.
//!
//! The module half runs a permanent watcher on its inner signal; while
//! coupled it pings the region half's update event through a back link.
//! The region half's driver task then copies the inner value outward.
//! While decoupled the external signal carries the channel's idle value
//! (`T::default()`), so external observers never see a stale value from a
//! previously unloaded module; on decouple the module's inner signal is
//! reset to the idle value as well.
//!
//! A sync coupling has nothing to propagate (a freshly loaded module has
//! written nothing yet) but still fires `synced` so generic callers can
//! wait uniformly.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reslot_kernel::{ChannelValue, EventId, Signal, Sim, SpawnSpec};
use tracing::debug;

use crate::adapter::{ModuleHalf, RegionHalf, downcast_peer};

pub(crate) struct SignalOutRegionHalf<T: ChannelValue> {
    member: String,
    external: Signal<T>,
    update: EventId,
    synced: EventId,
    bound: Rc<RefCell<Option<Rc<SignalOutModuleHalf<T>>>>>,
}

impl<T: ChannelValue> SignalOutRegionHalf<T> {
    pub(crate) fn new(sim: &mut Sim, owner: &str, member: &str) -> Rc<Self> {
        let path = format!("{owner}.{member}");
        let external = Signal::new(sim, &path);
        let update = sim.new_event(&format!("{path}.update"));
        let synced = sim.new_event(&format!("{path}.synced"));
        let bound: Rc<RefCell<Option<Rc<SignalOutModuleHalf<T>>>>> =
            Rc::new(RefCell::new(None));

        let driver_bound = Rc::clone(&bound);
        let driver_path = path.clone();
        sim.spawn(
            SpawnSpec::new(&format!("{path}.drive"), move |sim| {
                let value = match &*driver_bound.borrow() {
                    Some(peer) => peer.inner.read(sim),
                    None => T::default(),
                };
                debug!(adapter = %driver_path, value = ?value, "output driven");
                external.write(sim, value);
                Ok(())
            })
            .sensitive_to(update),
        );

        Rc::new(Self {
            member: member.to_owned(),
            external,
            update,
            synced,
            bound,
        })
    }

    /// The externally observed signal for this member.
    pub(crate) fn external(&self) -> Signal<T> {
        self.external
    }
}

impl<T: ChannelValue> RegionHalf for SignalOutRegionHalf<T> {
    fn member_name(&self) -> &str {
        &self.member
    }

    fn synced(&self) -> EventId {
        self.synced
    }

    fn dynamic_bind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>, sync: bool) {
        let peer = downcast_peer::<SignalOutModuleHalf<T>>(&self.member, peer);
        {
            let mut bound = self.bound.borrow_mut();
            assert!(
                bound.is_none(),
                "adapter `{}` already has a module half bound",
                self.member
            );
            peer.back.set(Some(self.update));
            *bound = Some(peer);
        }
        // Republish whatever the inner signal holds (the idle value for a
        // module that never ran; its preserved output otherwise).
        sim.notify(self.update);
        if sync {
            sim.notify(self.synced);
        }
    }

    fn dynamic_unbind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>) {
        let peer = downcast_peer::<SignalOutModuleHalf<T>>(&self.member, peer);
        {
            let mut bound = self.bound.borrow_mut();
            match bound.take() {
                Some(current) => assert!(
                    Rc::ptr_eq(&current, &peer),
                    "adapter `{}` unbound from a module half that is not the bound one",
                    self.member
                ),
                None => panic!("adapter `{}` has no module half bound", self.member),
            }
        }
        peer.back.set(None);
        // Idle value outward and on the module's own port.
        self.external.write(sim, T::default());
        peer.inner.write(sim, T::default());
    }
}

pub(crate) struct SignalOutModuleHalf<T: ChannelValue> {
    member: String,
    pub(crate) inner: Signal<T>,
    /// Region half's update event while coupled.
    back: Rc<Cell<Option<EventId>>>,
}

impl<T: ChannelValue> SignalOutModuleHalf<T> {
    pub(crate) fn new(sim: &mut Sim, owner: &str, member: &str) -> Rc<Self> {
        let path = format!("{owner}.{member}");
        let inner = Signal::new(sim, &path);
        let back: Rc<Cell<Option<EventId>>> = Rc::new(Cell::new(None));

        let watcher_back = Rc::clone(&back);
        sim.spawn(
            SpawnSpec::new(&format!("{path}.watch"), move |sim| {
                if let Some(update) = watcher_back.get() {
                    sim.notify(update);
                }
                Ok(())
            })
            .sensitive_to(inner.changed()),
        );

        Rc::new(Self {
            member: member.to_owned(),
            inner,
            back,
        })
    }
}

impl<T: ChannelValue> ModuleHalf for SignalOutModuleHalf<T> {
    fn member_name(&self) -> &str {
        &self.member
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
