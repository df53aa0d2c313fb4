//! Transaction lock vs reconfiguration: in-flight calls block unloads,
//! and the load window blocks new calls.

use std::rc::Rc;

use reslot_core::{ModuleSetup, ModuleSpec, Protocol, Region, Schema};
use reslot_kernel::Sim;

struct Ping;

impl Protocol for Ping {
    type FwReq = u32;
    type FwResp = u32;
    type BwReq = ();
    type BwResp = ();
}

fn ctl_schema() -> Schema {
    Schema::new("iface", 1024).target::<Ping>("ctl")
}

/// Serves forward calls by incrementing the request.
struct Echo;

impl ModuleSpec for Echo {
    const NAME: &'static str = "echo";
    type Args = ();

    fn setup(m: &mut ModuleSetup<'_>, (): ()) {
        let ctl = m.target::<Ping>("ctl");
        ctl.forward.bind(m.sim(), |_, req| Ok(req + 1));
    }
}

/// Serves forward calls by swapping the region over to [`Echo`] while the
/// call is still in flight.
struct SwapsMidCall;

impl ModuleSpec for SwapsMidCall {
    const NAME: &'static str = "swaps_mid_call";
    type Args = Rc<Region>;

    fn setup(m: &mut ModuleSetup<'_>, region: Self::Args) {
        let ctl = m.target::<Ping>("ctl");
        ctl.forward.bind(m.sim(), move |sim, _req| {
            region.configure::<Echo>(sim)?;
            Ok(0)
        });
    }
}

#[test]
fn calls_relay_through_the_coupled_module() {
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", ctl_schema());
    region.register::<Echo>(&mut sim, ()).unwrap();
    region.preload::<Echo>().unwrap();
    sim.run().unwrap();

    let ctl = region.external_target::<Ping>("ctl");
    assert_eq!(ctl.forward.call(&mut sim, 41).unwrap(), 42);
    assert_eq!(region.transactions_in_flight(), 0, "guard released");
}

#[test]
fn reconfigure_mid_call_aborts_with_active_interaction() {
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", ctl_schema());
    region
        .register::<SwapsMidCall>(&mut sim, Rc::clone(&region))
        .unwrap();
    region.register::<Echo>(&mut sim, ()).unwrap();
    region.preload::<SwapsMidCall>().unwrap();
    sim.run().unwrap();

    let ctl = region.external_target::<Ping>("ctl");
    let err = ctl.forward.call(&mut sim, 1).unwrap_err();
    assert_eq!(
        err.message(),
        "Cannot reconfigure a module while there are still active interaction with it."
    );
}

#[test]
fn reconfigure_after_the_call_completed_succeeds() {
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", ctl_schema());
    region.register::<Echo>(&mut sim, ()).unwrap();
    region.register::<SwapsMidCall>(&mut sim, Rc::clone(&region)).unwrap();
    region.preload::<Echo>().unwrap();
    sim.run().unwrap();

    let ctl = region.external_target::<Ping>("ctl");
    assert_eq!(ctl.forward.call(&mut sim, 1).unwrap(), 2);

    region.configure::<SwapsMidCall>(&mut sim).unwrap();
    sim.run().unwrap();
    assert_eq!(
        region.current_module().map(|module| module.name().to_owned()),
        Some("swaps_mid_call".to_owned())
    );
}

#[test]
fn transaction_during_the_load_window_aborts() {
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", ctl_schema());
    region.register::<Echo>(&mut sim, ()).unwrap();
    sim.run().unwrap();

    // Reconfiguration marked and transactions blocked at this instant.
    region.configure::<Echo>(&mut sim).unwrap();
    assert!(region.is_reconfiguring());

    let ctl = region.external_target::<Ping>("ctl");
    let err = ctl.forward.call(&mut sim, 1).unwrap_err();
    assert_eq!(
        err.message(),
        "Tried to start an interaction with a module while reconfiguration is in progress."
    );

    // The swap itself still completes.
    sim.run().unwrap();
    assert!(!region.is_reconfiguring());
    assert_eq!(ctl.forward.call(&mut sim, 1).unwrap(), 2);
}

#[test]
fn reconfigure_is_not_reentrant() {
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", ctl_schema());
    region.register::<Echo>(&mut sim, ()).unwrap();
    region.register::<SwapsMidCall>(&mut sim, Rc::clone(&region)).unwrap();
    sim.run().unwrap();

    region.configure::<Echo>(&mut sim).unwrap();
    let err = region.configure::<SwapsMidCall>(&mut sim).unwrap_err();
    assert_eq!(err.message(), "Reconfiguration already in progress.");
}

#[test]
fn unload_is_not_reentrant_during_a_load_window() {
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", ctl_schema());
    region.register::<Echo>(&mut sim, ()).unwrap();
    sim.run().unwrap();

    region.configure::<Echo>(&mut sim).unwrap();
    let err = region.unload(&mut sim).unwrap_err();
    assert_eq!(err.message(), "Reconfiguration already in progress.");
}

#[test]
fn deferred_reentrancy_surfaces_from_run() {
    // A task that calls configure while the load window is open faults
    // the whole run.
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", ctl_schema());
    region.register::<Echo>(&mut sim, ()).unwrap();
    region.register::<SwapsMidCall>(&mut sim, Rc::clone(&region)).unwrap();
    sim.run().unwrap();

    region.configure::<Echo>(&mut sim).unwrap();
    let racing = Rc::clone(&region);
    sim.call_in(100, move |sim| {
        racing.configure::<SwapsMidCall>(sim)?;
        Ok(())
    });
    let err = sim.run().unwrap_err();
    assert_eq!(err.message(), "Reconfiguration already in progress.");
}
