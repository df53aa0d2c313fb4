//! Reconfiguration core: regions, modules, adapters, and the swap engine.
//!
//! Models dynamic hot-swapping of hardware-like modules inside fixed
//! regions of an otherwise static simulated design. At any instant either
//! a module is fully coupled and operating, or the region is
//! mid-reconfiguration (decoupled, timed, then recoupling), never both.
//!
//! ```text
//!   static design                      region                 module (current)
//!   ─────────────   external   ┌──────────────────┐  couple  ┌───────────────┐
//!   signals/calls ─ endpoints ─┤ region halves     ├──────────┤ module halves │
//!                              │ transaction lock  │          │ work units    │
//!                              │ controller ───────┼─ swap ──▶│ nested regions│
//!                              └──────────────────┘           └───────────────┘
//! ```
//!
//! The same mechanism nests (a module may own inner regions) and splits
//! (disjoint member groups reconfiguring on independent schedules behind a
//! [`SplitHub`]).

mod adapter;
mod controller;
mod error;
mod lock;
mod module;
mod region;
mod schema;
mod split;

pub use error::ReconfError;
pub use lock::{LockState, TransactionGuard};
pub use module::{Configurable, DEFAULT_SIZE_BYTES, ModuleSetup, ModuleSpec};
pub use region::Region;
pub use schema::{Protocol, Schema, SocketEndpoint};
pub use split::{SplitDef, SplitGroup, SplitHub};
