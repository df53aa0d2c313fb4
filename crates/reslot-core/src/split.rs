//! Split hubs: independently reconfigurable slices of one region.
//!
//! A split hub partitions the base schema's members into named groups,
//! each with its own inner controller over the matching sub-schema. To the
//! region the hub is one more [`Configurable`]: coupling it connects the
//! inner controllers to the region, activation preloads each group, and
//! deactivation unloads every group before disconnecting.
//!
//! Group reconfigurations take the outer region's single reconfiguration
//! flag, so two groups serialize against each other and against the base
//! controller swapping the hub itself.

use std::rc::Rc;

use reslot_kernel::{EventId, Fault, Sim, TaskResult};
use tracing::debug;

use crate::controller::Controller;
use crate::module::{Configurable, DEFAULT_SIZE_BYTES, ModuleSpec};
use crate::region::Region;
use crate::schema::Schema;

/// Declaration of a split hub: named, disjoint member groups.
pub struct SplitDef {
    name: String,
    size_bytes: u64,
    groups: Vec<(String, Vec<String>)>,
}

impl SplitDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            size_bytes: DEFAULT_SIZE_BYTES,
            groups: Vec::new(),
        }
    }

    /// Declared size of the hub itself, for the base region's load timing.
    pub fn size_bytes(mut self, bytes: u64) -> Self {
        self.size_bytes = bytes;
        self
    }

    /// Adds a group over the named members.
    pub fn group(mut self, name: &str, members: &[&str]) -> Self {
        self.groups.push((
            name.to_owned(),
            members.iter().map(|&member| member.to_owned()).collect(),
        ));
        self
    }
}

/// One independently reconfigurable slice of the base interface.
pub struct SplitGroup {
    name: String,
    controller: Rc<Controller>,
}

impl SplitGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a module type for this group. Only valid before the
    /// simulation starts.
    pub fn register<M: ModuleSpec>(&self, sim: &mut Sim, args: M::Args) -> Result<(), Fault> {
        self.controller.register::<M>(sim, args)
    }

    /// Designates the module this group loads when the hub activates.
    pub fn preload<M: ModuleSpec>(&self) -> Result<(), Fault> {
        self.controller.preload::<M>()
    }

    /// Swaps this group over to `M`. Requires the hub to be coupled.
    pub fn configure<M: ModuleSpec>(&self, sim: &mut Sim) -> Result<(), Fault> {
        self.controller.configure::<M>(sim)
    }

    /// Unloads this group's current module.
    pub fn unload(&self, sim: &mut Sim) -> Result<(), Fault> {
        self.controller.unload(sim)
    }

    pub fn current_module(&self) -> Option<Rc<dyn Configurable>> {
        self.controller.current()
    }
}

/// The outer configurable unit owning one controller per group.
pub struct SplitHub {
    name: String,
    size_bytes: u64,
    groups: Vec<SplitGroup>,
}

impl SplitHub {
    pub(crate) fn build(base: &Rc<Schema>, def: SplitDef) -> Rc<Self> {
        let mut groups: Vec<SplitGroup> = Vec::with_capacity(def.groups.len());
        let mut claimed: Vec<&str> = Vec::new();
        for (group_name, members) in &def.groups {
            assert!(
                !groups.iter().any(|group| group.name == *group_name),
                "split `{}` declares group `{group_name}` twice",
                def.name
            );
            for member in members {
                assert!(
                    !claimed.contains(&member.as_str()),
                    "split `{}` assigns member `{member}` to more than one group",
                    def.name
                );
                claimed.push(member);
            }
            let member_refs: Vec<&str> = members.iter().map(String::as_str).collect();
            let path = format!("{}.{group_name}", def.name);
            let sub = Rc::new(base.subset(&path, &member_refs));
            groups.push(SplitGroup {
                name: group_name.clone(),
                controller: Controller::new(&path, &sub),
            });
        }
        Rc::new(Self {
            name: def.name,
            size_bytes: def.size_bytes,
            groups,
        })
    }

    /// Looks a group up by name.
    ///
    /// # Panics
    ///
    /// Panics on an unknown group name.
    pub fn group(&self, name: &str) -> &SplitGroup {
        match self.groups.iter().find(|group| group.name == name) {
            Some(group) => group,
            None => panic!("split `{}` has no group `{name}`", self.name),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &SplitGroup> {
        self.groups.iter()
    }
}

impl Configurable for SplitHub {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn couple(&self, _sim: &mut Sim, region: &Rc<Region>, _sync: bool) -> Vec<EventId> {
        // The groups manage their own adapters; coupling the hub only
        // connects the inner controllers so group-level configure calls
        // have a target.
        for group in &self.groups {
            group.controller.attach(region);
        }
        Vec::new()
    }

    fn decouple(&self, _sim: &mut Sim, _region: &Region) {
        // Groups are unloaded (and then disconnected) by deactivate, which
        // still needs the region reference; nothing to do here.
    }

    fn activate(&self, sim: &mut Sim) -> TaskResult {
        debug!(split = %self.name, "activating groups");
        for group in &self.groups {
            group.controller.perform_preload(sim, true)?;
        }
        Ok(())
    }

    fn deactivate(&self, sim: &mut Sim) -> TaskResult {
        // Runs inside the base controller's reconfiguration, which already
        // holds the shared flag, so the groups unload unprotected.
        debug!(split = %self.name, "unloading groups");
        for group in &self.groups {
            group.controller.unload_unprotected(sim)?;
        }
        for group in &self.groups {
            group.controller.detach();
        }
        Ok(())
    }
}
