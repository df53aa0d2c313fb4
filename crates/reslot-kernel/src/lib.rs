//! Cooperative discrete-event simulation kernel.
//!
//! The kernel runs an entire simulated design on one thread: a nanosecond
//! clock, an ordered queue of pending work, tasks with event sensitivity
//! lists, one-shot continuations, typed value signals, and typed call
//! channels. Same-instant work resolves in schedule order, which gives the
//! zero-delay notification the reconfiguration protocol needs ("deliver on
//! the next scheduling step").
//!
//! ```text
//!            ┌───────────────────────────────┐
//!            │              Sim              │
//!            │  clock     (time, seq) queue  │
//!            │  events ── subscribers/waiters│
//!            │  tasks  ── shared FnMut bodies│
//!            │  signals / call channels      │
//!            └───────────────────────────────┘
//!              notify ─▶ step tasks ─▶ faults abort the run
//! ```
//!
//! Handles (`EventId`, `TaskId`, `Signal<T>`, `CallChannel<Req, Resp>`) are
//! `Copy` indices into arenas owned by the [`Sim`]; no borrows or lifetimes
//! cross the object graph.

mod call;
mod clock;
mod event;
mod fault;
mod signal;
mod sim;
mod task;

pub use call::CallChannel;
pub use clock::SimClock;
pub use event::EventId;
pub use fault::Fault;
pub use signal::{ChannelValue, Signal};
pub use sim::Sim;
pub use task::{SpawnSpec, TaskFn, TaskId, TaskResult};
