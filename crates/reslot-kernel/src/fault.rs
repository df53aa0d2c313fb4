//! The run-aborting error type.

use std::fmt;

/// A fatal simulation error.
///
/// Every task and continuation returns `Result<(), Fault>`; the first fault
/// raised aborts the run and surfaces from [`Sim::run`](crate::Sim::run).
/// The message is preserved verbatim so callers can match on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Fault(pub String);

impl Fault {
    /// Creates a fault from any displayable message.
    pub fn new(msg: impl fmt::Display) -> Self {
        Self(msg.to_string())
    }

    /// Returns the fault message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Fault {
    fn from(msg: &str) -> Self {
        Self(msg.to_owned())
    }
}

impl From<String> for Fault {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_survives_conversion() {
        let fault = Fault::from("Cannot configure module that is not registered.");
        assert_eq!(
            fault.message(),
            "Cannot configure module that is not registered."
        );
        assert_eq!(fault.to_string(), fault.message());
    }
}
