//! Randomized operator soak: long seeded sequences of writes, swaps, and
//! unloads against a model of the expected external state.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use reslot_core::{ModuleSetup, ModuleSpec, Region, Schema};
use reslot_kernel::{Sim, SpawnSpec};
use test_case::test_case;

fn soak_schema() -> Schema {
    Schema::new("iface", 1024)
        .input::<u32>("data_in")
        .output::<u32>("data_out")
}

fn pipe_setup(m: &mut ModuleSetup<'_>, name: &'static str, f: fn(u32) -> u32) {
    let input = m.input::<u32>("data_in");
    let output = m.output::<u32>("data_out");
    m.work_unit(
        SpawnSpec::new(name, move |sim| {
            let value = input.read(sim);
            output.write(sim, f(value));
            Ok(())
        })
        .sensitive_to(input.changed())
        .initialize(),
    );
}

struct Identity;

impl ModuleSpec for Identity {
    const NAME: &'static str = "identity";
    type Args = ();

    fn setup(m: &mut ModuleSetup<'_>, (): ()) {
        pipe_setup(m, "identity.pipe", |value| value);
    }
}

struct Doubler;

impl ModuleSpec for Doubler {
    const NAME: &'static str = "doubler";
    type Args = ();

    fn setup(m: &mut ModuleSetup<'_>, (): ()) {
        pipe_setup(m, "doubler.pipe", |value| value.wrapping_mul(2));
    }
}

struct Negator;

impl ModuleSpec for Negator {
    const NAME: &'static str = "negator";
    type Args = ();

    fn setup(m: &mut ModuleSetup<'_>, (): ()) {
        pipe_setup(m, "negator.pipe", |value| !value);
    }
}

/// What the externals must read once the queue drains.
#[derive(Clone, Copy, PartialEq, Debug)]
enum Loaded {
    None,
    Identity,
    Doubler,
    Negator,
}

impl Loaded {
    fn apply(self, value: u32) -> u32 {
        match self {
            // Idle value while nothing is coupled.
            Loaded::None => 0,
            Loaded::Identity => value,
            Loaded::Doubler => value.wrapping_mul(2),
            Loaded::Negator => !value,
        }
    }

    fn name(self) -> Option<&'static str> {
        match self {
            Loaded::None => None,
            Loaded::Identity => Some("identity"),
            Loaded::Doubler => Some("doubler"),
            Loaded::Negator => Some("negator"),
        }
    }
}

#[test_case(0x5eed_0001; "seed 1")]
#[test_case(0x5eed_0002; "seed 2")]
#[test_case(0xdead_beef; "seed 3")]
fn random_operator_sequences_preserve_the_invariants(seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", soak_schema());
    region.register::<Identity>(&mut sim, ()).unwrap();
    region.register::<Doubler>(&mut sim, ()).unwrap();
    region.register::<Negator>(&mut sim, ()).unwrap();
    sim.run().unwrap();

    let mut loaded = Loaded::None;
    let mut written: u32 = 0;
    for step in 0..400 {
        let before_ns = sim.now();
        match rng.gen_range(0..6) {
            0 | 1 => {
                written = rng.r#gen();
                region.external_input::<u32>("data_in").write(&mut sim, written);
            }
            2 => {
                region.configure::<Identity>(&mut sim).unwrap();
                loaded = Loaded::Identity;
            }
            3 => {
                region.configure::<Doubler>(&mut sim).unwrap();
                loaded = Loaded::Doubler;
            }
            4 => {
                region.configure::<Negator>(&mut sim).unwrap();
                loaded = Loaded::Negator;
            }
            _ => {
                region.unload(&mut sim).unwrap();
                loaded = Loaded::None;
            }
        }
        sim.run().unwrap();

        assert!(sim.now() >= before_ns, "time went backwards at step {step}");
        assert!(!region.is_reconfiguring(), "swap left hanging at step {step}");
        assert_eq!(region.transactions_in_flight(), 0);
        assert_eq!(
            region.external_output::<u32>("data_out").read(&sim),
            loaded.apply(written),
            "wrong external value at step {step} with {loaded:?} loaded"
        );
        assert_eq!(
            region
                .current_module()
                .map(|module| module.name().to_owned()),
            loaded.name().map(str::to_owned),
            "wrong module at step {step}"
        );
    }
}
