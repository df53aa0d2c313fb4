//! Call forwarding: request/response relays across the coupling boundary.
//!
//! One half pair serves both orientations. `In` is the direction entered
//! from outside (the external channel's handler relays into the coupled
//! module), `Out` is the direction the module initiates (the inner
//! channel's handler relays to the external channel). A target member maps
//! forward calls to `In` and backward calls to `Out`; an initiator member
//! is the mirror image.
//!
//! Every relay begins a region transaction before touching the peer, so an
//! unload cannot interrupt a call mid-flight, and a call attempted during
//! a reconfiguration is rejected before it reaches a stale module.
//! Coupling only rebinds the cross-reference; there is nothing to
//! synchronize, so a sync coupling fires `synced` on the next scheduling
//! step.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use reslot_kernel::{CallChannel, EventId, Sim};
use tracing::debug;

use crate::adapter::{ModuleHalf, RegionHalf, downcast_peer};
use crate::lock::{LockState, TransactionGuard};

/// Link from the module half back to its region half's outbound channel.
pub(crate) struct SocketBack<OutReq, OutResp> {
    ext: CallChannel<OutReq, OutResp>,
    lock: LockState,
}

impl<OutReq, OutResp> Clone for SocketBack<OutReq, OutResp> {
    fn clone(&self) -> Self {
        Self {
            ext: self.ext,
            lock: self.lock.clone(),
        }
    }
}

pub(crate) struct SocketRegionHalf<InReq, InResp, OutReq, OutResp> {
    member: String,
    ext_in: CallChannel<InReq, InResp>,
    ext_out: CallChannel<OutReq, OutResp>,
    synced: EventId,
    bound: Rc<RefCell<Option<Rc<SocketModuleHalf<InReq, InResp, OutReq, OutResp>>>>>,
    lock: LockState,
}

impl<InReq: 'static, InResp: 'static, OutReq: 'static, OutResp: 'static>
    SocketRegionHalf<InReq, InResp, OutReq, OutResp>
{
    pub(crate) fn new(sim: &mut Sim, owner: &str, member: &str, lock: &LockState) -> Rc<Self> {
        let path = format!("{owner}.{member}");
        let ext_in = CallChannel::new(sim, &format!("{path}.in"));
        let ext_out = CallChannel::new(sim, &format!("{path}.out"));
        let synced = sim.new_event(&format!("{path}.synced"));
        let bound: Rc<RefCell<Option<Rc<SocketModuleHalf<InReq, InResp, OutReq, OutResp>>>>> =
            Rc::new(RefCell::new(None));

        // Inbound relay: external callers enter here for the life of the
        // region; the coupled module half is resolved per call.
        let relay_bound = Rc::clone(&bound);
        let relay_lock = lock.clone();
        let relay_path = path.clone();
        ext_in.bind(sim, move |sim, req| {
            let _guard = TransactionGuard::begin(&relay_lock)?;
            let peer = relay_bound.borrow().clone();
            let Some(peer) = peer else {
                panic!("call through uncoupled adapter `{relay_path}`");
            };
            debug!(adapter = %relay_path, "inbound call relayed");
            peer.inner_in.call(sim, req)
        });

        Rc::new(Self {
            member: member.to_owned(),
            ext_in,
            ext_out,
            synced,
            bound,
            lock: lock.clone(),
        })
    }

    /// External channel pair: (entered from outside, exited by the module).
    pub(crate) fn external(
        &self,
    ) -> (CallChannel<InReq, InResp>, CallChannel<OutReq, OutResp>) {
        (self.ext_in, self.ext_out)
    }
}

impl<InReq: 'static, InResp: 'static, OutReq: 'static, OutResp: 'static> RegionHalf
    for SocketRegionHalf<InReq, InResp, OutReq, OutResp>
{
    fn member_name(&self) -> &str {
        &self.member
    }

    fn synced(&self) -> EventId {
        self.synced
    }

    fn dynamic_bind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>, sync: bool) {
        let peer = downcast_peer::<SocketModuleHalf<InReq, InResp, OutReq, OutResp>>(
            &self.member,
            peer,
        );
        {
            let mut bound = self.bound.borrow_mut();
            assert!(
                bound.is_none(),
                "adapter `{}` already has a module half bound",
                self.member
            );
            peer.back.replace(Some(SocketBack {
                ext: self.ext_out,
                lock: self.lock.clone(),
            }));
            *bound = Some(peer);
        }
        if sync {
            sim.notify(self.synced);
        }
    }

    fn dynamic_unbind(&self, _sim: &mut Sim, peer: &Rc<dyn ModuleHalf>) {
        let peer = downcast_peer::<SocketModuleHalf<InReq, InResp, OutReq, OutResp>>(
            &self.member,
            peer,
        );
        let mut bound = self.bound.borrow_mut();
        match bound.take() {
            Some(current) => assert!(
                Rc::ptr_eq(&current, &peer),
                "adapter `{}` unbound from a module half that is not the bound one",
                self.member
            ),
            None => panic!("adapter `{}` has no module half bound", self.member),
        }
        peer.back.replace(None);
    }
}

pub(crate) struct SocketModuleHalf<InReq, InResp, OutReq, OutResp> {
    member: String,
    /// The module binds its handler for inbound calls here.
    pub(crate) inner_in: CallChannel<InReq, InResp>,
    /// The module initiates outbound calls here.
    pub(crate) inner_out: CallChannel<OutReq, OutResp>,
    back: Rc<RefCell<Option<SocketBack<OutReq, OutResp>>>>,
}

impl<InReq: 'static, InResp: 'static, OutReq: 'static, OutResp: 'static>
    SocketModuleHalf<InReq, InResp, OutReq, OutResp>
{
    pub(crate) fn new(sim: &mut Sim, owner: &str, member: &str) -> Rc<Self> {
        let path = format!("{owner}.{member}");
        let inner_in = CallChannel::new(sim, &format!("{path}.in"));
        let inner_out = CallChannel::new(sim, &format!("{path}.out"));
        let back: Rc<RefCell<Option<SocketBack<OutReq, OutResp>>>> =
            Rc::new(RefCell::new(None));

        // Outbound relay: module calls exit through the region half the
        // back link currently points at.
        let relay_back = Rc::clone(&back);
        let relay_path = path.clone();
        inner_out.bind(sim, move |sim, req| {
            let link = relay_back.borrow().clone();
            let Some(link) = link else {
                panic!("call through uncoupled adapter `{relay_path}`");
            };
            let _guard = TransactionGuard::begin(&link.lock)?;
            debug!(adapter = %relay_path, "outbound call relayed");
            link.ext.call(sim, req)
        });

        Rc::new(Self {
            member: member.to_owned(),
            inner_in,
            inner_out,
            back,
        })
    }
}

impl<InReq: 'static, InResp: 'static, OutReq: 'static, OutResp: 'static> ModuleHalf
    for SocketModuleHalf<InReq, InResp, OutReq, OutResp>
{
    fn member_name(&self) -> &str {
        &self.member
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
