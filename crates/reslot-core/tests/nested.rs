//! Nested regions: preload on the owner's activation, forced unload on
//! deactivation, and the work-units-then-nested-unload ordering.

use std::cell::RefCell;
use std::rc::Rc;

use reslot_core::{ModuleSetup, ModuleSpec, Region, Schema};
use reslot_kernel::{Sim, SpawnSpec};

type EventLog = Rc<RefCell<Vec<String>>>;

/// Inner module: logs its lifecycle and ticks every 10 ns while active.
struct InnerWorker;

impl ModuleSpec for InnerWorker {
    const NAME: &'static str = "inner_worker";
    type Args = EventLog;

    fn setup(m: &mut ModuleSetup<'_>, log: Self::Args) {
        let tick = m.sim().new_event("inner_worker.tick");
        {
            let log = Rc::clone(&log);
            m.on_activate(move |_| {
                log.borrow_mut().push("inner:activate".to_owned());
                Ok(())
            });
        }
        {
            let log = Rc::clone(&log);
            m.on_deactivate(move |_| {
                log.borrow_mut().push("inner:deactivate".to_owned());
                Ok(())
            });
        }
        m.work_unit(
            SpawnSpec::new("inner_worker.tick", move |sim| {
                log.borrow_mut().push(format!("inner:tick@{}", sim.now()));
                sim.notify_in(tick, 10);
                Ok(())
            })
            .sensitive_to(tick)
            .initialize(),
        );
    }
}

/// Outer module owning one nested region with [`InnerWorker`] preloaded.
struct Outer;

impl ModuleSpec for Outer {
    const NAME: &'static str = "outer";
    type Args = EventLog;

    fn setup(m: &mut ModuleSetup<'_>, log: Self::Args) {
        {
            let log = Rc::clone(&log);
            m.on_activate(move |_| {
                log.borrow_mut().push("outer:activate".to_owned());
                Ok(())
            });
        }
        {
            let log = Rc::clone(&log);
            m.on_deactivate(move |_| {
                log.borrow_mut().push("outer:deactivate".to_owned());
                Ok(())
            });
        }
        let nested = m.nested_region("rz.inner", Schema::new("inner_iface", 1024));
        nested.register::<InnerWorker>(m.sim(), log).unwrap();
        nested.preload::<InnerWorker>().unwrap();
    }
}

struct Idle;

impl ModuleSpec for Idle {
    const NAME: &'static str = "idle";
    type Args = ();

    fn setup(_m: &mut ModuleSetup<'_>, (): ()) {}
}

fn outer_schema() -> Schema {
    Schema::new("outer_iface", 1024).input::<u32>("cfg")
}

#[test]
fn nested_region_preloads_when_the_owner_activates() {
    let mut sim = Sim::new();
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let region = Region::new(&mut sim, "rz", outer_schema());
    region.register::<Outer>(&mut sim, Rc::clone(&log)).unwrap();
    region.preload::<Outer>().unwrap();
    sim.run_for(5).unwrap();

    let entries = log.borrow();
    assert_eq!(entries[0], "outer:activate");
    assert_eq!(entries[1], "inner:activate");
    assert!(
        entries[2..].iter().any(|entry| entry == "inner:tick@0"),
        "inner work runs once the nested preload finished: {entries:?}"
    );
}

#[test]
fn deactivation_stops_work_units_before_unloading_nested_regions() {
    let mut sim = Sim::new();
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let region = Region::new(&mut sim, "rz", outer_schema());
    region.register::<Outer>(&mut sim, Rc::clone(&log)).unwrap();
    region.register::<Idle>(&mut sim, ()).unwrap();
    region.preload::<Outer>().unwrap();
    sim.run_for(35).unwrap();

    region.configure::<Idle>(&mut sim).unwrap();
    let swap_at = sim.now();
    sim.run().unwrap();

    let entries = log.borrow().clone();
    let deact = entries
        .iter()
        .position(|entry| entry == "outer:deactivate")
        .expect("outer deactivated");
    let inner_deact = entries
        .iter()
        .position(|entry| entry == "inner:deactivate")
        .expect("inner unloaded");
    assert!(
        deact < inner_deact,
        "owner hook runs before the nested unload: {entries:?}"
    );

    // No nested activity after the owner's stop.
    for entry in &entries[inner_deact..] {
        if let Some(at) = entry.strip_prefix("inner:tick@") {
            let at: u64 = at.parse().unwrap();
            assert!(
                at < swap_at,
                "nested region ticked after the owner was stopped: {entries:?}"
            );
        }
    }
    assert!(
        !entries[inner_deact..]
            .iter()
            .any(|entry| entry.starts_with("inner:tick")),
        "no nested activity after the unload: {entries:?}"
    );
}

#[test]
fn nested_region_reloads_on_every_owner_activation() {
    let mut sim = Sim::new();
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let region = Region::new(&mut sim, "rz", outer_schema());
    region.register::<Outer>(&mut sim, Rc::clone(&log)).unwrap();
    region.register::<Idle>(&mut sim, ()).unwrap();
    region.preload::<Outer>().unwrap();
    sim.run_for(5).unwrap();

    region.configure::<Idle>(&mut sim).unwrap();
    sim.run().unwrap();
    region.configure::<Outer>(&mut sim).unwrap();
    // The reloaded inner worker reschedules itself forever; run a bounded
    // window covering the load delay plus a few ticks.
    sim.run_for(1_200).unwrap();

    let entries = log.borrow();
    let activations = entries
        .iter()
        .filter(|entry| *entry == "inner:activate")
        .count();
    assert_eq!(activations, 2, "{entries:?}");
}
