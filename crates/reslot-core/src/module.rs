//! Module instances: the swappable units a region can load.
//!
//! A module type implements [`ModuleSpec`]; its `setup` runs once at
//! registration (elaboration time) against a [`ModuleSetup`], declaring
//! endpoints, work units, lifecycle hooks, declared size, and any nested
//! regions. The instance lives for the whole run and is reused across
//! every future load of its type; state is not reset between loads unless
//! the module's own activation hook does so.
//!
//! [`Configurable`] is what a region can hold as "currently loaded":
//! module instances and split hubs both implement it.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use reslot_kernel::{ChannelValue, EventId, Signal, Sim, SpawnSpec, TaskId, TaskResult};
use tracing::debug;

use crate::adapter::ModuleHalf;
use crate::region::Region;
use crate::schema::{Protocol, Schema, SocketEndpoint};

/// Declared size fallback when a module does not specify one.
pub const DEFAULT_SIZE_BYTES: u64 = 1024;

type HookFn = dyn Fn(&mut Sim) -> TaskResult;

/// Anything a region can hold as its currently loaded unit.
pub trait Configurable {
    fn name(&self) -> &str;

    /// Declared size, used only for load timing.
    fn size_bytes(&self) -> u64;

    /// Couples this unit's adapter halves to `region`. Returns the synced
    /// events to await when `sync` is set.
    fn couple(&self, sim: &mut Sim, region: &Rc<Region>, sync: bool) -> Vec<EventId>;

    /// Unbinds this unit's adapter halves from `region`.
    fn decouple(&self, sim: &mut Sim, region: &Region);

    /// Hook, then work units, then nested preloads.
    fn activate(&self, sim: &mut Sim) -> TaskResult;

    /// Hook, then kill work units, then force-unload nested regions.
    fn deactivate(&self, sim: &mut Sim) -> TaskResult;
}

/// A registrable module type.
pub trait ModuleSpec: 'static {
    const NAME: &'static str;

    /// Constructor arguments passed through `register`.
    type Args;

    fn setup(m: &mut ModuleSetup<'_>, args: Self::Args);
}

/// The author surface a module's `setup` runs against.
pub struct ModuleSetup<'a> {
    sim: &'a mut Sim,
    name: String,
    endpoints: HashMap<String, Box<dyn Any>>,
    size_bytes: u64,
    work: Vec<SpawnSpec>,
    nested: Vec<Rc<Region>>,
    on_activate: Option<Box<HookFn>>,
    on_deactivate: Option<Box<HookFn>>,
}

impl ModuleSetup<'_> {
    /// Access to the simulation, for module-internal signals and events.
    pub fn sim(&mut self) -> &mut Sim {
        self.sim
    }

    /// This module's exposed signal for an input member.
    pub fn input<T: ChannelValue>(&self, member: &str) -> Signal<T> {
        self.endpoint(member)
    }

    /// This module's exposed signal for an output member.
    pub fn output<T: ChannelValue>(&self, member: &str) -> Signal<T> {
        self.endpoint(member)
    }

    /// This module's channel pair for a target member: bind `forward`,
    /// call `backward`.
    pub fn target<P: Protocol>(&self, member: &str) -> SocketEndpoint<P> {
        self.endpoint(member)
    }

    /// This module's channel pair for an initiator member: call `forward`,
    /// bind `backward`.
    pub fn initiator<P: Protocol>(&self, member: &str) -> SocketEndpoint<P> {
        self.endpoint(member)
    }

    pub fn input_vec<T: ChannelValue>(&self, member: &str) -> Vec<Signal<T>> {
        self.endpoint(member)
    }

    pub fn output_vec<T: ChannelValue>(&self, member: &str) -> Vec<Signal<T>> {
        self.endpoint(member)
    }

    pub fn target_vec<P: Protocol>(&self, member: &str) -> Vec<SocketEndpoint<P>> {
        self.endpoint(member)
    }

    pub fn initiator_vec<P: Protocol>(&self, member: &str) -> Vec<SocketEndpoint<P>> {
        self.endpoint(member)
    }

    /// Declares the module's size for load timing.
    pub fn set_size_bytes(&mut self, bytes: u64) {
        self.size_bytes = bytes;
    }

    /// Declares a concurrent work unit, spawned on every activation and
    /// killed on deactivation.
    pub fn work_unit(&mut self, spec: SpawnSpec) {
        self.work.push(spec);
    }

    pub fn on_activate(&mut self, hook: impl Fn(&mut Sim) -> TaskResult + 'static) {
        self.on_activate = Some(Box::new(hook));
    }

    pub fn on_deactivate(&mut self, hook: impl Fn(&mut Sim) -> TaskResult + 'static) {
        self.on_deactivate = Some(Box::new(hook));
    }

    /// Declares a nested region owned by this module. It is preloaded when
    /// the module activates and force-unloaded when it deactivates. The
    /// module instance keeps the region alive; the returned handle is a
    /// convenience for wiring during setup.
    pub fn nested_region(&mut self, name: &str, schema: Schema) -> Rc<Region> {
        let region = Region::build(self.sim, name, schema, true);
        self.nested.push(Rc::clone(&region));
        region
    }

    fn endpoint<E: Clone + 'static>(&self, member: &str) -> E {
        match self
            .endpoints
            .get(member)
            .and_then(|endpoint| endpoint.downcast_ref::<E>())
        {
            Some(endpoint) => endpoint.clone(),
            None => panic!(
                "module `{}` has no member `{member}` of the requested type",
                self.name
            ),
        }
    }
}

/// One live module instance.
pub(crate) struct ModuleCore {
    name: String,
    size_bytes: u64,
    halves: Vec<Rc<dyn ModuleHalf>>,
    work: Vec<SpawnSpec>,
    running: RefCell<Vec<TaskId>>,
    nested: Vec<Rc<Region>>,
    on_activate: Option<Box<HookFn>>,
    on_deactivate: Option<Box<HookFn>>,
}

impl ModuleCore {
    pub(crate) fn build<M: ModuleSpec>(sim: &mut Sim, schema: &Schema, args: M::Args) -> Rc<Self> {
        let mut halves = Vec::with_capacity(schema.members().len());
        let mut endpoints = HashMap::new();
        for decl in schema.members() {
            let (half, endpoint) = decl.build.build_module_half(sim, M::NAME, &decl.name);
            halves.push(half);
            endpoints.insert(decl.name.clone(), endpoint);
        }
        let mut setup = ModuleSetup {
            sim,
            name: M::NAME.to_owned(),
            endpoints,
            size_bytes: DEFAULT_SIZE_BYTES,
            work: Vec::new(),
            nested: Vec::new(),
            on_activate: None,
            on_deactivate: None,
        };
        M::setup(&mut setup, args);
        Rc::new(Self {
            name: setup.name,
            size_bytes: setup.size_bytes,
            halves,
            work: setup.work,
            running: RefCell::new(Vec::new()),
            nested: setup.nested,
            on_activate: setup.on_activate,
            on_deactivate: setup.on_deactivate,
        })
    }
}

impl Configurable for ModuleCore {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn couple(&self, sim: &mut Sim, region: &Rc<Region>, sync: bool) -> Vec<EventId> {
        let mut synced = Vec::new();
        for half in &self.halves {
            let region_half = Rc::clone(region.half(half.member_name()));
            region_half.dynamic_bind(sim, half, sync);
            if sync {
                synced.push(region_half.synced());
            }
        }
        synced
    }

    fn decouple(&self, sim: &mut Sim, region: &Region) {
        for half in &self.halves {
            let region_half = Rc::clone(region.half(half.member_name()));
            region_half.dynamic_unbind(sim, half);
        }
    }

    fn activate(&self, sim: &mut Sim) -> TaskResult {
        debug!(module = %self.name, "activate");
        if let Some(hook) = &self.on_activate {
            hook(sim)?;
        }
        {
            let mut running = self.running.borrow_mut();
            for spec in &self.work {
                running.push(sim.spawn(spec.clone()));
            }
        }
        for nested in &self.nested {
            nested.controller().perform_preload(sim, true)?;
        }
        Ok(())
    }

    fn deactivate(&self, sim: &mut Sim) -> TaskResult {
        debug!(module = %self.name, "deactivate");
        if let Some(hook) = &self.on_deactivate {
            hook(sim)?;
        }
        for task in self.running.borrow_mut().drain(..) {
            sim.kill(task);
        }
        for nested in &self.nested {
            nested.controller().unload(sim)?;
        }
        Ok(())
    }
}
