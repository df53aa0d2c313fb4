//! Vector adapters: one element pair per lane, coupled as a unit.
//!
//! The aggregate `synced` is the conjunction of every lane's `synced`:
//! it fires once all lanes have reported after a sync coupling.

use std::any::Any;
use std::rc::Rc;

use reslot_kernel::{EventId, Sim};

use crate::adapter::{ModuleHalf, RegionHalf, downcast_peer};

pub(crate) struct VectorRegionHalf {
    member: String,
    synced: EventId,
    lanes: Vec<Rc<dyn RegionHalf>>,
}

impl VectorRegionHalf {
    pub(crate) fn new(
        sim: &mut Sim,
        owner: &str,
        member: &str,
        lanes: Vec<Rc<dyn RegionHalf>>,
    ) -> Rc<Self> {
        let synced = sim.new_event(&format!("{owner}.{member}.synced"));
        Rc::new(Self {
            member: member.to_owned(),
            synced,
            lanes,
        })
    }
}

impl RegionHalf for VectorRegionHalf {
    fn member_name(&self) -> &str {
        &self.member
    }

    fn synced(&self) -> EventId {
        self.synced
    }

    fn dynamic_bind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>, sync: bool) {
        let peer = downcast_peer::<VectorModuleHalf>(&self.member, peer);
        assert_eq!(
            self.lanes.len(),
            peer.lanes.len(),
            "adapter `{}` lane count mismatch",
            self.member
        );
        if sync {
            let lane_synced: Vec<EventId> = self.lanes.iter().map(|lane| lane.synced()).collect();
            let synced = self.synced;
            sim.wait_all(&lane_synced, move |sim| {
                sim.notify(synced);
                Ok(())
            });
        }
        for (lane, peer_lane) in self.lanes.iter().zip(&peer.lanes) {
            lane.dynamic_bind(sim, peer_lane, sync);
        }
    }

    fn dynamic_unbind(&self, sim: &mut Sim, peer: &Rc<dyn ModuleHalf>) {
        let peer = downcast_peer::<VectorModuleHalf>(&self.member, peer);
        for (lane, peer_lane) in self.lanes.iter().zip(&peer.lanes) {
            lane.dynamic_unbind(sim, peer_lane);
        }
    }
}

pub(crate) struct VectorModuleHalf {
    member: String,
    pub(crate) lanes: Vec<Rc<dyn ModuleHalf>>,
}

impl VectorModuleHalf {
    pub(crate) fn new(member: &str, lanes: Vec<Rc<dyn ModuleHalf>>) -> Rc<Self> {
        Rc::new(Self {
            member: member.to_owned(),
            lanes,
        })
    }
}

impl ModuleHalf for VectorModuleHalf {
    fn member_name(&self) -> &str {
        &self.member
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
