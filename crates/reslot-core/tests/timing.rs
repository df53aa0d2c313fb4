//! Load timing: configure advances simulated time by exactly
//! size / bandwidth, and re-configuring the current module is free.

use proptest::prelude::*;
use reslot_core::{ModuleSetup, ModuleSpec, Region, Schema};
use reslot_kernel::Sim;
use test_case::test_case;

struct Filler;

impl ModuleSpec for Filler {
    const NAME: &'static str = "filler";
    type Args = ();

    fn setup(_m: &mut ModuleSetup<'_>, (): ()) {}
}

struct SizedFiller;

impl ModuleSpec for SizedFiller {
    const NAME: &'static str = "sized_filler";
    type Args = u64;

    fn setup(m: &mut ModuleSetup<'_>, size_bytes: u64) {
        m.set_size_bytes(size_bytes);
    }
}

#[test]
fn default_module_at_1024_mbps_loads_in_one_microsecond() {
    let mut sim = Sim::new();
    let schema = Schema::new("iface", 1024).input::<u32>("cfg");
    let region = Region::new(&mut sim, "rz", schema);
    region.register::<Filler>(&mut sim, ()).unwrap();
    sim.run().unwrap();

    region.configure::<Filler>(&mut sim).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.now(), 1_000, "1024 B at 1024 MB/s is 1 us");
}

#[test]
fn configuring_the_current_module_advances_time_by_zero() {
    let mut sim = Sim::new();
    let schema = Schema::new("iface", 1024).input::<u32>("cfg");
    let region = Region::new(&mut sim, "rz", schema);
    region.register::<Filler>(&mut sim, ()).unwrap();
    sim.run().unwrap();

    region.configure::<Filler>(&mut sim).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.now(), 1_000);

    // Already configured: logged no-op, no delay, no error.
    region.configure::<Filler>(&mut sim).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.now(), 1_000);
}

#[test_case(512, 1024, 500; "half a default module")]
#[test_case(2048, 1024, 2_000; "double size, double delay")]
#[test_case(100, 380, 263; "icap bandwidth")]
#[test_case(140, 380, 368; "icap bandwidth, larger module")]
fn load_delay_follows_the_linear_model(size_bytes: u64, bandwidth_mbps: u64, expect_ns: u64) {
    let mut sim = Sim::new();
    let schema = Schema::new("iface", bandwidth_mbps).input::<u32>("cfg");
    let region = Region::new(&mut sim, "rz", schema);
    region.register::<SizedFiller>(&mut sim, size_bytes).unwrap();
    sim.run().unwrap();

    region.configure::<SizedFiller>(&mut sim).unwrap();
    sim.run().unwrap();
    assert_eq!(sim.now(), expect_ns);
}

#[test]
fn preload_takes_no_simulated_time() {
    let mut sim = Sim::new();
    let schema = Schema::new("iface", 1024).input::<u32>("cfg");
    let region = Region::new(&mut sim, "rz", schema);
    region.register::<Filler>(&mut sim, ()).unwrap();
    region.preload::<Filler>().unwrap();
    sim.run().unwrap();
    assert_eq!(sim.now(), 0);
    assert_eq!(
        region.current_module().map(|module| module.name().to_owned()),
        Some("filler".to_owned())
    );
}

proptest! {
    #[test]
    fn configure_advances_time_by_size_over_bandwidth(
        size_bytes in 1u64..1_000_000,
        bandwidth_mbps in 1u64..4_096,
    ) {
        prop_assume!(size_bytes * 1000 / bandwidth_mbps > 0);

        let mut sim = Sim::new();
        let schema = Schema::new("iface", bandwidth_mbps).input::<u32>("cfg");
        let region = Region::new(&mut sim, "rz", schema);
        region.register::<SizedFiller>(&mut sim, size_bytes).unwrap();
        sim.run().unwrap();

        region.configure::<SizedFiller>(&mut sim).unwrap();
        sim.run().unwrap();
        prop_assert_eq!(sim.now(), size_bytes * 1000 / bandwidth_mbps);
    }
}
