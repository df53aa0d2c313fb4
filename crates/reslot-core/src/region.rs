//! Regions: the fixed slots modules are swapped in and out of.
//!
//! A region owns the region halves of every member its schema declares,
//! the external endpoints the static design binds to, the transaction
//! lock, and its controller. A non-nested region preloads its preselected
//! module when the simulation starts; a nested region (declared through
//! [`ModuleSetup::nested_region`](crate::ModuleSetup::nested_region)) is
//! preloaded by its owning module's activation instead.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use reslot_kernel::{ChannelValue, Fault, Sim, Signal};

use crate::adapter::RegionHalf;
use crate::controller::Controller;
use crate::error::ReconfError;
use crate::lock::LockState;
use crate::module::{Configurable, ModuleSpec};
use crate::schema::{Protocol, Schema, SocketEndpoint};
use crate::split::{SplitDef, SplitHub};

pub struct Region {
    name: String,
    lock: LockState,
    halves: Vec<Rc<dyn RegionHalf>>,
    externals: HashMap<String, Box<dyn Any>>,
    controller: Rc<Controller>,
}

impl Region {
    /// Creates a top-level region. Its preselected module (see
    /// [`preload`](Region::preload)) is loaded when the simulation starts.
    pub fn new(sim: &mut Sim, name: &str, schema: Schema) -> Rc<Self> {
        Self::build(sim, name, schema, false)
    }

    pub(crate) fn build(sim: &mut Sim, name: &str, schema: Schema, nested: bool) -> Rc<Self> {
        let schema = Rc::new(schema);
        let lock = LockState::new();
        let mut halves = Vec::with_capacity(schema.members().len());
        let mut externals = HashMap::new();
        for decl in schema.members() {
            let (half, endpoint) = decl.build.build_region_half(sim, name, &decl.name, &lock);
            halves.push(half);
            externals.insert(decl.name.clone(), endpoint);
        }
        let controller = Controller::new(name, &schema);
        let region = Rc::new(Self {
            name: name.to_owned(),
            lock,
            halves,
            externals,
            controller,
        });
        region.controller.attach(&region);
        if !nested {
            let controller = Rc::clone(&region.controller);
            sim.at_start(move |sim| controller.perform_preload(sim, false));
        }
        region
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.lock.is_reconfiguring()
    }

    pub fn transactions_in_flight(&self) -> u32 {
        self.lock.transactions_in_flight()
    }

    pub(crate) fn lock(&self) -> &LockState {
        &self.lock
    }

    pub(crate) fn controller(&self) -> &Rc<Controller> {
        &self.controller
    }

    pub(crate) fn half(&self, member: &str) -> &Rc<dyn RegionHalf> {
        match self
            .halves
            .iter()
            .find(|half| half.member_name() == member)
        {
            Some(half) => half,
            None => panic!("region `{}` has no member `{member}`", self.name),
        }
    }

    // ========================================================================
    // External endpoints
    // ========================================================================

    /// The externally driven signal of an input member.
    pub fn external_input<T: ChannelValue>(&self, member: &str) -> Signal<T> {
        self.external(member)
    }

    /// The externally observed signal of an output member.
    pub fn external_output<T: ChannelValue>(&self, member: &str) -> Signal<T> {
        self.external(member)
    }

    /// The external channel pair of a target member: call `forward`, bind
    /// `backward`.
    pub fn external_target<P: Protocol>(&self, member: &str) -> SocketEndpoint<P> {
        self.external(member)
    }

    /// The external channel pair of an initiator member: bind `forward`,
    /// call `backward`.
    pub fn external_initiator<P: Protocol>(&self, member: &str) -> SocketEndpoint<P> {
        self.external(member)
    }

    pub fn external_input_vec<T: ChannelValue>(&self, member: &str) -> Vec<Signal<T>> {
        self.external(member)
    }

    pub fn external_output_vec<T: ChannelValue>(&self, member: &str) -> Vec<Signal<T>> {
        self.external(member)
    }

    pub fn external_target_vec<P: Protocol>(&self, member: &str) -> Vec<SocketEndpoint<P>> {
        self.external(member)
    }

    pub fn external_initiator_vec<P: Protocol>(&self, member: &str) -> Vec<SocketEndpoint<P>> {
        self.external(member)
    }

    fn external<E: Clone + 'static>(&self, member: &str) -> E {
        match self
            .externals
            .get(member)
            .and_then(|endpoint| endpoint.downcast_ref::<E>())
        {
            Some(endpoint) => endpoint.clone(),
            None => panic!(
                "region `{}` has no member `{member}` of the requested type",
                self.name
            ),
        }
    }

    // ========================================================================
    // Operator surface
    // ========================================================================

    /// Registers a module type, constructing its single instance. Only
    /// valid before the simulation starts.
    pub fn register<M: ModuleSpec>(&self, sim: &mut Sim, args: M::Args) -> Result<(), Fault> {
        self.controller.register::<M>(sim, args)
    }

    /// Designates the module to load, without the timed sequence, at the
    /// next preload point (simulation start for a top-level region).
    pub fn preload<M: ModuleSpec>(&self) -> Result<(), Fault> {
        self.controller.preload::<M>()
    }

    /// Swaps the region over to `M`: unloads the current module, waits the
    /// load delay, couples and activates the new one. The timed phase runs
    /// inside the simulation; deferred faults surface from `Sim::run`.
    pub fn configure<M: ModuleSpec>(&self, sim: &mut Sim) -> Result<(), Fault> {
        self.controller.configure::<M>(sim)
    }

    /// Unloads the current module, leaving nothing coupled.
    pub fn unload(&self, sim: &mut Sim) -> Result<(), Fault> {
        self.controller.unload(sim)
    }

    pub fn current_module(&self) -> Option<Rc<dyn Configurable>> {
        self.controller.current()
    }

    pub fn is_registered<M: ModuleSpec>(&self) -> bool {
        self.controller.is_registered_key(TypeId::of::<M>())
    }

    // ========================================================================
    // Split surface
    // ========================================================================

    /// Registers a split hub built from `def`. The returned handle is how
    /// group-level modules are registered and configured. One hub per
    /// region.
    pub fn register_split(&self, sim: &mut Sim, def: SplitDef) -> Result<Rc<SplitHub>, Fault> {
        if sim.is_running() {
            return Err(ReconfError::RegisterDuringSim.into());
        }
        let hub = SplitHub::build(self.controller.schema(), def);
        self.controller
            .insert_configurable(TypeId::of::<SplitHub>(), Rc::clone(&hub) as Rc<dyn Configurable>)?;
        Ok(hub)
    }

    /// Designates the split hub for the next preload point.
    pub fn preload_split(&self) -> Result<(), Fault> {
        self.controller.preload_key(TypeId::of::<SplitHub>())
    }

    /// Swaps the region over to its split hub.
    pub fn configure_split(&self, sim: &mut Sim) -> Result<(), Fault> {
        self.controller.configure_key(sim, TypeId::of::<SplitHub>())
    }
}
