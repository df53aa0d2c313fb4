//! Region transaction lock.
//!
//! Makes "is anyone mid-call through this region right now" observable and
//! keeps reconfiguration from interrupting one. Three pieces of state:
//! the `reconfiguring` flag (one reconfiguration in flight region-wide),
//! the `blocked` flag (the load window, when no new transaction may start),
//! and the count of transactions in flight.
//!
//! All mutation happens inside single scheduler steps, so plain shared
//! state behind `Rc<RefCell>` is the whole synchronization story.

use std::cell::RefCell;
use std::rc::Rc;

use reslot_kernel::Fault;

use crate::error::ReconfError;

#[derive(Debug, Default)]
struct LockInner {
    reconfiguring: bool,
    blocked: bool,
    transactions: u32,
}

/// Shared handle to a region's lock state.
#[derive(Debug, Clone, Default)]
pub struct LockState {
    inner: Rc<RefCell<LockInner>>,
}

impl LockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a new transaction, or rejects it while transactions are
    /// blocked or a reconfiguration is marked.
    pub fn start_transaction(&self) -> Result<(), Fault> {
        let mut state = self.inner.borrow_mut();
        if state.blocked || state.reconfiguring {
            return Err(ReconfError::TransactionWhileReconfiguring.into());
        }
        state.transactions += 1;
        Ok(())
    }

    pub fn end_transaction(&self) {
        let mut state = self.inner.borrow_mut();
        debug_assert!(state.transactions > 0, "end_transaction without a start");
        state.transactions = state.transactions.saturating_sub(1);
    }

    /// Rejects an unload while any transaction is still in flight.
    pub fn check_unload_ok(&self) -> Result<(), Fault> {
        if self.inner.borrow().transactions > 0 {
            return Err(ReconfError::ActiveTransactions.into());
        }
        Ok(())
    }

    /// Marks the start of a reconfiguration; re-entry is forbidden.
    pub fn mark_reconf_begin(&self) -> Result<(), Fault> {
        let mut state = self.inner.borrow_mut();
        if state.reconfiguring {
            return Err(ReconfError::AlreadyReconfiguring.into());
        }
        state.reconfiguring = true;
        Ok(())
    }

    pub fn mark_reconf_end(&self) {
        self.inner.borrow_mut().reconfiguring = false;
    }

    pub fn block_transactions(&self) {
        self.inner.borrow_mut().blocked = true;
    }

    pub fn unblock_transactions(&self) {
        self.inner.borrow_mut().blocked = false;
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.inner.borrow().reconfiguring
    }

    pub fn transactions_in_flight(&self) -> u32 {
        self.inner.borrow().transactions
    }
}

/// Scope-bound transaction: acquired at the start of a relay, released on
/// every exit path, including propagated faults.
pub struct TransactionGuard {
    lock: LockState,
}

impl TransactionGuard {
    pub fn begin(lock: &LockState) -> Result<Self, Fault> {
        lock.start_transaction()?;
        Ok(Self { lock: lock.clone() })
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        self.lock.end_transaction();
    }
}
