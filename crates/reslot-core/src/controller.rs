//! The reconfiguration engine.
//!
//! One controller per region (and one per split group). It owns the typed
//! registry of configurable units and drives the swap state machine:
//!
//! ```text
//! Idle ─▶ ReconfigBegin ─▶ TransactionsBlocked ─▶ (Unloading)
//!      ─▶ LoadDelay ─▶ Coupling ─▶ TransactionsUnblocked ─▶ Idle
//! ```
//!
//! The decouple of the old unit and the start of the load-time wait happen
//! within the same simulated instant; couple, unblock, and activate happen
//! within one instant at the end of the delay, so no transaction can start
//! between unblock and activate.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use reslot_kernel::{Fault, Sim, TaskResult};
use tracing::{debug, info};

use crate::error::ReconfError;
use crate::module::{Configurable, ModuleCore, ModuleSpec};
use crate::region::Region;
use crate::schema::Schema;

/// Load delay in nanoseconds for a unit of `size_bytes` over a region of
/// `bandwidth_mbps` megabytes per second.
pub(crate) fn load_delay_ns(size_bytes: u64, bandwidth_mbps: u64) -> u64 {
    size_bytes * 1000 / bandwidth_mbps
}

pub(crate) struct Controller {
    name: String,
    schema: Rc<Schema>,
    region: RefCell<Weak<Region>>,
    registry: RefCell<HashMap<TypeId, Rc<dyn Configurable>>>,
    current: RefCell<Option<Rc<dyn Configurable>>>,
    preselected: RefCell<Option<Rc<dyn Configurable>>>,
}

impl Controller {
    pub(crate) fn new(name: &str, schema: &Rc<Schema>) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_owned(),
            schema: Rc::clone(schema),
            region: RefCell::new(Weak::new()),
            registry: RefCell::new(HashMap::new()),
            current: RefCell::new(None),
            preselected: RefCell::new(None),
        })
    }

    pub(crate) fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    pub(crate) fn attach(&self, region: &Rc<Region>) {
        self.region.replace(Rc::downgrade(region));
    }

    pub(crate) fn detach(&self) {
        self.region.replace(Weak::new());
    }

    fn region(&self) -> Rc<Region> {
        match self.region.borrow().upgrade() {
            Some(region) => region,
            None => panic!("controller `{}` is not connected to a region", self.name),
        }
    }

    // ========================================================================
    // Registry
    // ========================================================================

    pub(crate) fn register<M: ModuleSpec>(
        &self,
        sim: &mut Sim,
        args: M::Args,
    ) -> Result<(), Fault> {
        if sim.is_running() {
            return Err(ReconfError::RegisterDuringSim.into());
        }
        if self.registry.borrow().contains_key(&TypeId::of::<M>()) {
            return Err(ReconfError::AlreadyRegistered.into());
        }
        let module = ModuleCore::build::<M>(sim, &self.schema, args);
        debug!(controller = %self.name, module = M::NAME, "module registered");
        self.registry
            .borrow_mut()
            .insert(TypeId::of::<M>(), module);
        Ok(())
    }

    /// Registers a pre-built configurable (the split hub path).
    pub(crate) fn insert_configurable(
        &self,
        key: TypeId,
        unit: Rc<dyn Configurable>,
    ) -> Result<(), Fault> {
        if self.registry.borrow().contains_key(&key) {
            return Err(ReconfError::AlreadyRegistered.into());
        }
        self.registry.borrow_mut().insert(key, unit);
        Ok(())
    }

    pub(crate) fn is_registered_key(&self, key: TypeId) -> bool {
        self.registry.borrow().contains_key(&key)
    }

    fn lookup(&self, key: TypeId) -> Option<Rc<dyn Configurable>> {
        self.registry.borrow().get(&key).cloned()
    }

    pub(crate) fn current(&self) -> Option<Rc<dyn Configurable>> {
        self.current.borrow().clone()
    }

    // ========================================================================
    // Preload
    // ========================================================================

    /// Designates the unit to load at the next `perform_preload`.
    pub(crate) fn preload_key(&self, key: TypeId) -> Result<(), Fault> {
        let unit = self
            .lookup(key)
            .ok_or(ReconfError::PreloadUnregistered)?;
        self.preselected.replace(Some(unit));
        Ok(())
    }

    pub(crate) fn preload<M: ModuleSpec>(&self) -> Result<(), Fault> {
        self.preload_key(TypeId::of::<M>())
    }

    /// Loads the preselected unit without the timed sequence. Nested calls
    /// skip adapter synchronization, since the enclosing module's own
    /// coupling re-triggers it.
    pub(crate) fn perform_preload(&self, sim: &mut Sim, nested: bool) -> TaskResult {
        let Some(unit) = self.preselected.borrow().clone() else {
            return Ok(());
        };
        let region = self.region();
        info!(controller = %self.name, module = unit.name(), "preloading");
        let sync = !nested;
        let synced = unit.couple(sim, &region, sync);
        self.current.replace(Some(Rc::clone(&unit)));
        if sync && !synced.is_empty() {
            sim.wait_all(&synced, move |sim| unit.activate(sim));
        } else {
            unit.activate(sim)?;
        }
        Ok(())
    }

    // ========================================================================
    // Configure / unload
    // ========================================================================

    pub(crate) fn configure<M: ModuleSpec>(self: &Rc<Self>, sim: &mut Sim) -> Result<(), Fault> {
        self.configure_key(sim, TypeId::of::<M>())
    }

    pub(crate) fn configure_key(self: &Rc<Self>, sim: &mut Sim, key: TypeId) -> Result<(), Fault> {
        let unit = self
            .lookup(key)
            .ok_or(ReconfError::ConfigureUnregistered)?;
        self.reconfigure(sim, unit)
    }

    fn reconfigure(
        self: &Rc<Self>,
        sim: &mut Sim,
        unit: Rc<dyn Configurable>,
    ) -> Result<(), Fault> {
        if let Some(current) = self.current() {
            if Rc::ptr_eq(&current, &unit) {
                info!(controller = %self.name, module = unit.name(), "module already configured");
                return Ok(());
            }
        }
        let region = self.region();
        region.lock().mark_reconf_begin()?;
        region.lock().block_transactions();
        self.unload_unprotected(sim)?;

        let delay_ns = load_delay_ns(unit.size_bytes(), self.schema.bandwidth_mbps());
        assert!(
            delay_ns > 0,
            "load delay for module `{}` is zero (size={} bytes, bandwidth={} MB/s)",
            unit.name(),
            unit.size_bytes(),
            self.schema.bandwidth_mbps()
        );
        info!(
            controller = %self.name,
            module = unit.name(),
            delay_ns,
            "reconfiguration started"
        );
        self.current.replace(Some(unit));

        let this = Rc::clone(self);
        sim.call_in(delay_ns, move |sim| this.finish_load(sim));
        Ok(())
    }

    /// End of the load window: couple the new unit, wait for every adapter
    /// to report synced, then unblock/activate/clear within one instant.
    fn finish_load(self: &Rc<Self>, sim: &mut Sim) -> TaskResult {
        let Some(unit) = self.current() else {
            panic!("controller `{}` finished a load with no pending module", self.name);
        };
        let region = self.region();
        let synced = unit.couple(sim, &region, true);
        if synced.is_empty() {
            self.complete(sim)
        } else {
            let this = Rc::clone(self);
            sim.wait_all(&synced, move |sim| this.complete(sim));
            Ok(())
        }
    }

    fn complete(&self, sim: &mut Sim) -> TaskResult {
        let Some(unit) = self.current() else {
            panic!("controller `{}` completed a load with no pending module", self.name);
        };
        let region = self.region();
        region.lock().unblock_transactions();
        unit.activate(sim)?;
        region.lock().mark_reconf_end();
        info!(controller = %self.name, module = unit.name(), "reconfiguration complete");
        Ok(())
    }

    /// Unloads the current unit, leaving the region with nothing coupled.
    pub(crate) fn unload(&self, sim: &mut Sim) -> Result<(), Fault> {
        let region = self.region();
        region.lock().mark_reconf_begin()?;
        region.lock().block_transactions();
        let result = self.unload_unprotected(sim);
        region.lock().unblock_transactions();
        region.lock().mark_reconf_end();
        result
    }

    /// The unload body, without the reconfiguration marking. Callers hold
    /// the reconfiguration already (configure, or an enclosing swap that
    /// tears this group down).
    pub(crate) fn unload_unprotected(&self, sim: &mut Sim) -> Result<(), Fault> {
        let Some(unit) = self.current() else {
            return Ok(());
        };
        let region = self.region();
        region.lock().check_unload_ok()?;
        debug!(controller = %self.name, module = unit.name(), "unloading");
        unit.decouple(sim, &region);
        unit.deactivate(sim)?;
        self.current.replace(None);
        Ok(())
    }
}
