//! Typed synchronous call channels.
//!
//! A call channel is a single-direction request/response endpoint: one
//! handler is bound (and may be rebound any number of times), and `call`
//! invokes it synchronously within the current scheduling step. This is the
//! relay primitive the call-forwarding adapters are built on.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::fault::Fault;
use crate::sim::Sim;

type Handler<Req, Resp> = Rc<RefCell<dyn FnMut(&mut Sim, Req) -> Result<Resp, Fault>>>;

pub(crate) struct CallSlot<Req, Resp> {
    name: String,
    handler: Option<Handler<Req, Resp>>,
}

/// Handle to a call channel owned by a [`Sim`].
pub struct CallChannel<Req, Resp> {
    index: usize,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Clone for CallChannel<Req, Resp> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Req, Resp> Copy for CallChannel<Req, Resp> {}

impl<Req, Resp> fmt::Debug for CallChannel<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallChannel")
            .field("index", &self.index)
            .finish()
    }
}

impl<Req: 'static, Resp: 'static> CallChannel<Req, Resp> {
    /// Allocates an unbound channel.
    pub fn new(sim: &mut Sim, name: &str) -> Self {
        let index = sim.channels.len();
        sim.channels.push(Box::new(CallSlot::<Req, Resp> {
            name: name.to_owned(),
            handler: None,
        }));
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Binds (or rebinds) the handler.
    pub fn bind(&self, sim: &mut Sim, f: impl FnMut(&mut Sim, Req) -> Result<Resp, Fault> + 'static) {
        self.slot_mut(sim).handler = Some(Rc::new(RefCell::new(f)));
    }

    /// Drops the handler; subsequent calls are a fatal precondition failure.
    pub fn unbind(&self, sim: &mut Sim) {
        self.slot_mut(sim).handler = None;
    }

    /// True while a handler is bound.
    pub fn is_bound(&self, sim: &Sim) -> bool {
        self.slot(sim).handler.is_some()
    }

    /// Invokes the bound handler synchronously.
    ///
    /// # Panics
    ///
    /// Panics if no handler is bound.
    pub fn call(&self, sim: &mut Sim, req: Req) -> Result<Resp, Fault> {
        let handler = {
            let slot = self.slot(sim);
            match &slot.handler {
                Some(handler) => Rc::clone(handler),
                None => panic!("call on unbound call channel `{}`", slot.name),
            }
        };
        let mut body = handler.borrow_mut();
        (&mut *body)(sim, req)
    }

    fn slot<'a>(&self, sim: &'a Sim) -> &'a CallSlot<Req, Resp> {
        match sim.channels[self.index].downcast_ref() {
            Some(slot) => slot,
            None => panic!("call channel handle used with the wrong request/response types"),
        }
    }

    fn slot_mut<'a>(&self, sim: &'a mut Sim) -> &'a mut CallSlot<Req, Resp> {
        match sim.channels[self.index].downcast_mut() {
            Some(slot) => slot,
            None => panic!("call channel handle used with the wrong request/response types"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_handler_answers() {
        let mut sim = Sim::new();
        let chan = CallChannel::<u32, u32>::new(&mut sim, "double");
        chan.bind(&mut sim, |_, req| Ok(req * 2));
        assert!(chan.is_bound(&sim));
        assert_eq!(chan.call(&mut sim, 21).unwrap(), 42);
    }

    #[test]
    fn rebinding_replaces_the_handler() {
        let mut sim = Sim::new();
        let chan = CallChannel::<u32, u32>::new(&mut sim, "f");
        chan.bind(&mut sim, |_, req| Ok(req + 1));
        chan.bind(&mut sim, |_, req| Ok(req + 100));
        assert_eq!(chan.call(&mut sim, 1).unwrap(), 101);
    }

    #[test]
    fn handler_faults_propagate() {
        let mut sim = Sim::new();
        let chan = CallChannel::<(), ()>::new(&mut sim, "failing");
        chan.bind(&mut sim, |_, ()| Err(Fault::from("relay refused")));
        let err = chan.call(&mut sim, ()).unwrap_err();
        assert_eq!(err.message(), "relay refused");
    }

    #[test]
    fn handler_can_use_the_sim() {
        let mut sim = Sim::new();
        let chan = CallChannel::<u64, u64>::new(&mut sim, "now");
        chan.bind(&mut sim, |sim, offset| Ok(sim.now() + offset));
        assert_eq!(chan.call(&mut sim, 5).unwrap(), 5);
    }

    #[test]
    #[should_panic(expected = "call on unbound call channel `orphan`")]
    fn unbound_call_panics() {
        let mut sim = Sim::new();
        let chan = CallChannel::<(), ()>::new(&mut sim, "orphan");
        let _ = chan.call(&mut sim, ());
    }

    #[test]
    fn unbind_detaches() {
        let mut sim = Sim::new();
        let chan = CallChannel::<u32, u32>::new(&mut sim, "f");
        chan.bind(&mut sim, |_, req| Ok(req));
        chan.unbind(&mut sim);
        assert!(!chan.is_bound(&sim));
    }
}
