//! Reconfiguration protocol errors.
//!
//! Every variant is a programmer/model error, not a recoverable runtime
//! condition: each aborts the surrounding run with a fixed message that
//! tests assert on verbatim.

use reslot_kernel::Fault;

/// Fatal misuse of the reconfiguration protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReconfError {
    /// configure/unload invoked while another reconfiguration is in flight.
    #[error("Reconfiguration already in progress.")]
    AlreadyReconfiguring,

    /// A call/transaction attempted while transactions are blocked.
    #[error("Tried to start an interaction with a module while reconfiguration is in progress.")]
    TransactionWhileReconfiguring,

    /// Unload attempted with outstanding transactions.
    #[error("Cannot reconfigure a module while there are still active interaction with it.")]
    ActiveTransactions,

    /// configure referenced an unknown module type.
    #[error("Cannot configure module that is not registered.")]
    ConfigureUnregistered,

    /// preload referenced an unknown module type.
    #[error("Cannot preload module that is not registered.")]
    PreloadUnregistered,

    /// A module type was registered twice with the same controller.
    #[error("Module already registered.")]
    AlreadyRegistered,

    /// Registration attempted after the simulation started.
    #[error("Cannot register module during simulation time.")]
    RegisterDuringSim,
}

impl From<ReconfError> for Fault {
    fn from(err: ReconfError) -> Self {
        Fault::new(err)
    }
}
