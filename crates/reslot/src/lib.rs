//! reslot: dynamic module hot-swap simulation.
//!
//! A region is a fixed slot in an otherwise static simulated design where
//! exactly one module is plugged in at a time. Swapping is timed (load
//! delay = module size over region bandwidth), transactional (a swap never
//! interrupts an in-flight call), and recursive (modules may own nested
//! regions; a region's interface may split into independently
//! reconfigurable groups).
//!
//! ```text
//!  Schema ──▶ Region ──▶ register / preload ──▶ Sim::run
//!                │
//!                ├─ configure::<M>() ─ unload ─ delay ─ couple ─ activate
//!                └─ external endpoints for the static design
//! ```
//!
//! The simulation kernel ([`Sim`], [`Signal`], [`CallChannel`], tasks) is
//! re-exported from `reslot-kernel`; the reconfiguration machinery
//! ([`Region`], [`Schema`], [`ModuleSpec`], [`SplitDef`]) from
//! `reslot-core`.

pub use reslot_core::{
    Configurable, DEFAULT_SIZE_BYTES, LockState, ModuleSetup, ModuleSpec, Protocol, ReconfError,
    Region, Schema, SocketEndpoint, SplitDef, SplitGroup, SplitHub, TransactionGuard,
};
pub use reslot_kernel::{
    CallChannel, ChannelValue, EventId, Fault, Signal, Sim, SimClock, SpawnSpec, TaskFn, TaskId,
    TaskResult,
};
