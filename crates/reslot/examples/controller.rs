//! Two writer modules alternating in one region.
//!
//! A static memory sits outside the region and serves write requests. The
//! region's interface exposes a `reconf_imminent` input, a
//! `ready_for_reconf` output, and an initiator socket toward the memory.
//! Whichever writer is loaded sends a write every 5 ns until it is asked
//! to stand down, then reports ready; an external driver then swaps the
//! region over to the other writer.
//!
//! Run with `RUST_LOG=debug cargo run --example controller` to watch the
//! adapter and controller activity.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reslot::{
    EventId, Fault, ModuleSetup, ModuleSpec, Protocol, Region, Schema, Signal, Sim, SpawnSpec,
};
use tracing::{debug, info};

#[derive(Clone, Debug)]
struct WriteReq {
    addr: u64,
    byte: u8,
}

struct MemBus;

impl Protocol for MemBus {
    type FwReq = WriteReq;
    type FwResp = ();
    type BwReq = ();
    type BwResp = ();
}

/// ICAP-style load bandwidth in MB/s.
const LOAD_BANDWIDTH_MBPS: u64 = 380;

/// Static memory size; writer addresses wrap at this boundary.
const MEM_SIZE: u64 = 1024;

fn controlled_interface() -> Schema {
    Schema::new("controlled", LOAD_BANDWIDTH_MBPS)
        .input::<bool>("reconf_imminent")
        .output::<bool>("ready_for_reconf")
        .initiator::<MemBus>("bus")
}

/// Declares a writer that stamps `byte` at increasing addresses starting
/// at `base`, every 5 ns, and reports ready once a swap is announced.
fn writer_setup(m: &mut ModuleSetup<'_>, label: &str, base: u64, byte: u8, size_bytes: u64) {
    let reconf_imminent = m.input::<bool>("reconf_imminent");
    let ready = m.output::<bool>("ready_for_reconf");
    let bus = m.initiator::<MemBus>("bus");
    m.set_size_bytes(size_bytes);

    let tick = m.sim().new_event(&format!("{label}.tick"));
    let addr = Rc::new(Cell::new(base));
    let reset_addr = Rc::clone(&addr);
    m.on_activate(move |_| {
        reset_addr.set(base);
        Ok(())
    });
    m.work_unit(
        SpawnSpec::new(&format!("{label}.send"), move |sim| {
            if reconf_imminent.read(sim) {
                ready.write(sim, true);
                return Ok(());
            }
            let at = addr.get();
            addr.set((at + 1) % MEM_SIZE);
            bus.forward.call(sim, WriteReq { addr: at, byte })?;
            sim.notify_in(tick, 5);
            Ok(())
        })
        .sensitive_to(tick)
        .initialize(),
    );
}

struct Writer1;

impl ModuleSpec for Writer1 {
    const NAME: &'static str = "writer1";
    type Args = ();

    fn setup(m: &mut ModuleSetup<'_>, (): ()) {
        writer_setup(m, Self::NAME, 0, b'1', 100);
    }
}

struct Writer2;

impl ModuleSpec for Writer2 {
    const NAME: &'static str = "writer2";
    type Args = ();

    fn setup(m: &mut ModuleSetup<'_>, (): ()) {
        writer_setup(m, Self::NAME, 50, b'2', 140);
    }
}

/// Announces a swap after `delay_ns`, waits for the loaded writer to
/// report ready, reconfigures, and schedules the next round.
fn schedule_swap(
    sim: &mut Sim,
    region: Rc<Region>,
    reconf_imminent: Signal<bool>,
    ready_changed: EventId,
    to_first: bool,
    delay_ns: u64,
) {
    sim.call_in(delay_ns, move |sim| {
        reconf_imminent.write(sim, true);
        sim.on_next(ready_changed, move |sim| {
            if to_first {
                region.configure::<Writer1>(sim)?;
            } else {
                region.configure::<Writer2>(sim)?;
            }
            reconf_imminent.write(sim, false);
            // Next announcement well past the load delay, so the swaps
            // never overlap.
            schedule_swap(
                sim,
                Rc::clone(&region),
                reconf_imminent,
                ready_changed,
                !to_first,
                1_000,
            );
            Ok(())
        });
        Ok(())
    });
}

fn main() -> Result<(), Fault> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut sim = Sim::new();
    let region = Region::new(&mut sim, "rz", controlled_interface());
    region.register::<Writer1>(&mut sim, ())?;
    region.register::<Writer2>(&mut sim, ())?;
    region.preload::<Writer1>()?;

    // The static memory outside the region.
    let memory = Rc::new(RefCell::new([0u8; MEM_SIZE as usize]));
    let bus = region.external_initiator::<MemBus>("bus");
    let mem = Rc::clone(&memory);
    bus.forward.bind(&mut sim, move |sim, req| {
        debug!(at = sim.now(), addr = req.addr, byte = %(req.byte as char), "memory write");
        mem.borrow_mut()[req.addr as usize] = req.byte;
        Ok(())
    });

    let reconf_imminent = region.external_input::<bool>("reconf_imminent");
    let ready = region.external_output::<bool>("ready_for_reconf");
    schedule_swap(
        &mut sim,
        Rc::clone(&region),
        reconf_imminent,
        ready.changed(),
        false,
        100,
    );

    sim.run_for(2_500)?;

    let written = memory.borrow().iter().filter(|&&b| b != 0).count();
    info!(
        time_ns = sim.now(),
        cells_written = written,
        "simulation finished"
    );
    Ok(())
}
