//! Adapter pairs: the forwarding shims between a region's static bindings
//! and whichever module is currently coupled.
//!
//! Every exposed member gets a matched pair: the region half (owned by the
//! region, alive for the whole run) and the module half (owned by a module
//! instance). The two are bound to each other only while coupled; the
//! cross-reference is non-owning and cleared on decouple.
//!
//! Four forwarding strategies:
//! - input mirroring ([`signal_in`]): external value pushed into the module
//! - output mirroring ([`signal_out`]): module value copied outward, idle
//!   value driven while decoupled
//! - call forwarding ([`socket`]): request/response relays in both
//!   directions, each wrapped by the region's transaction lock
//! - vectors ([`vector`]): one element pair per lane, aggregate synced

use std::any::Any;
use std::rc::Rc;

use reslot_kernel::{EventId, Sim};

pub(crate) mod signal_in;
pub(crate) mod signal_out;
pub(crate) mod socket;
pub(crate) mod vector;

/// Region-owned half of an adapter pair.
pub(crate) trait RegionHalf {
    fn member_name(&self) -> &str;

    /// Fired once initial values have propagated after a sync coupling.
    fn synced(&self) -> EventId;

    /// Binds `peer` as the coupled module half.
    ///
    /// # Panics
    ///
    /// Panics if a module half is already bound, or if `peer` is not this
    /// adapter's kind of module half.
    fn dynamic_bind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>, sync: bool);

    /// Unbinds `peer`.
    ///
    /// # Panics
    ///
    /// Panics if `peer` is not exactly the bound module half.
    fn dynamic_unbind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>);
}

/// Module-owned half of an adapter pair.
pub(crate) trait ModuleHalf {
    fn member_name(&self) -> &str;
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Downcasts a peer half to the concrete type a region half expects.
pub(crate) fn downcast_peer<H: 'static>(member: &str, peer: &Rc<dyn ModuleHalf>) -> Rc<H> {
    match Rc::clone(peer).as_any_rc().downcast::<H>() {
        Ok(half) => half,
        Err(_) => panic!("adapter `{member}` coupled to a module half of the wrong kind"),
    }
}
