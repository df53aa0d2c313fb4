//! Input mirroring: the region receives an external value, the coupled
//! module must see it.
//!
//! The region half runs one permanent relay task, sensitive to the external
//! signal's change event and to a bind event. Whenever either fires and a
//! module half is bound, the current external value is pushed into the
//! module half's inner signal. A sync coupling raises the `syncing` flag
//! and pings the bind event, so the relay pushes the current value once and
//! fires `synced` after that push.

use std::any::Any;
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use reslot_kernel::{ChannelValue, EventId, Signal, Sim, SpawnSpec};
use tracing::debug;

use crate::adapter::{ModuleHalf, RegionHalf, downcast_peer};

struct InBind<T: ChannelValue> {
    bound: Option<Rc<SignalInModuleHalf<T>>>,
    syncing: bool,
}

pub(crate) struct SignalInRegionHalf<T: ChannelValue> {
    member: String,
    external: Signal<T>,
    bind_event: EventId,
    synced: EventId,
    state: Rc<RefCell<InBind<T>>>,
}

impl<T: ChannelValue> SignalInRegionHalf<T> {
    pub(crate) fn new(sim: &mut Sim, owner: &str, member: &str) -> Rc<Self> {
        let path = format!("{owner}.{member}");
        let external = Signal::new(sim, &path);
        let bind_event = sim.new_event(&format!("{path}.bind"));
        let synced = sim.new_event(&format!("{path}.synced"));
        let state = Rc::new(RefCell::new(InBind {
            bound: None,
            syncing: false,
        }));

        let relay_state = Rc::clone(&state);
        let relay_path = path.clone();
        sim.spawn(
            SpawnSpec::new(&format!("{path}.relay"), move |sim| {
                let (target, syncing) = {
                    let mut state = relay_state.borrow_mut();
                    (state.bound.clone(), mem::take(&mut state.syncing))
                };
                if let Some(peer) = target {
                    let value = external.read(sim);
                    debug!(adapter = %relay_path, value = ?value, "input forwarded");
                    peer.inner.write(sim, value);
                    if syncing {
                        sim.notify(synced);
                    }
                }
                Ok(())
            })
            .sensitive_to(external.changed())
            .sensitive_to(bind_event),
        );

        Rc::new(Self {
            member: member.to_owned(),
            external,
            bind_event,
            synced,
            state,
        })
    }

    /// The externally driven signal for this member.
    pub(crate) fn external(&self) -> Signal<T> {
        self.external
    }
}

impl<T: ChannelValue> RegionHalf for SignalInRegionHalf<T> {
    fn member_name(&self) -> &str {
        &self.member
    }

    fn synced(&self) -> EventId {
        self.synced
    }

    fn dynamic_bind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>, sync: bool) {
        let peer = downcast_peer::<SignalInModuleHalf<T>>(&self.member, peer);
        {
            let mut state = self.state.borrow_mut();
            assert!(
                state.bound.is_none(),
                "adapter `{}` already has a module half bound",
                self.member
            );
            state.bound = Some(peer);
            state.syncing = sync;
        }
        // Push the current value to the fresh module; the relay fires
        // `synced` afterwards when a sync coupling asked for it.
        sim.notify(self.bind_event);
    }

    fn dynamic_unbind(&self, _sim: &mut Sim, peer: &Rc<dyn ModuleHalf>) {
        let peer = downcast_peer::<SignalInModuleHalf<T>>(&self.member, peer);
        let mut state = self.state.borrow_mut();
        match state.bound.take() {
            Some(bound) => assert!(
                Rc::ptr_eq(&bound, &peer),
                "adapter `{}` unbound from a module half that is not the bound one",
                self.member
            ),
            None => panic!("adapter `{}` has no module half bound", self.member),
        }
        state.syncing = false;
    }
}

pub(crate) struct SignalInModuleHalf<T: ChannelValue> {
    member: String,
    pub(crate) inner: Signal<T>,
}

impl<T: ChannelValue> SignalInModuleHalf<T> {
    pub(crate) fn new(sim: &mut Sim, owner: &str, member: &str) -> Rc<Self> {
        Rc::new(Self {
            member: member.to_owned(),
            inner: Signal::new(sim, &format!("{owner}.{member}")),
        })
    }
}

impl<T: ChannelValue> ModuleHalf for SignalInModuleHalf<T> {
    fn member_name(&self) -> &str {
        &self.member
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
