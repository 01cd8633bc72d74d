use std::fmt;

use futures::task::SpawnError;
use thiserror::Error;
use weave_di::DynError;

/// The phase a scope tree is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Digest,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Digest => f.write_str("$digest"),
            Phase::Apply => f.write_str("$apply"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScopeError {
    /// A digest or apply was started while another one is active on the same tree
    #[error("{0} already in progress")]
    PhaseInProgress(Phase),

    /// The watch graph did not stabilize within the configured number of passes
    #[error("{ttl} digest iterations reached")]
    DigestOverrun { ttl: usize },

    /// The expression given to `apply` failed
    #[error("{0}")]
    Expression(#[source] DynError),

    /// Deferred work could not be handed to the executor
    #[error("Failed to schedule deferred work: {0}")]
    Schedule(#[from] SpawnError),

    /// The root scope owning this tree no longer exists
    #[error("The root scope of this tree has been dropped")]
    RootDropped,
}
