//! Error types for workflow-core.

use crate::execution::ExecutionId;

/// A handle could not produce its live execution.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// Nothing is persisted for the execution.
    #[error("Execution '{0}' not found")]
    NotFound(ExecutionId),
    /// Persisted state exists but cannot be turned back into an execution.
    #[error("Execution '{id}' has corrupt state: {reason}")]
    Corrupt {
        /// The execution whose state is corrupt.
        id: ExecutionId,
        /// What went wrong while reconstructing it.
        reason: String,
    },
    /// The storage holding the execution is unreachable or shutting down.
    #[error("Execution storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// A placeholder's described resource could not be reconstructed.
///
/// This is only ever delivered through a [`PendingResource`](crate::pending::PendingResource);
/// `begin_rehydrate` never returns it synchronously. It is `Clone` because every
/// waiter on the same pending resource observes the same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RehydrationError {
    /// The described resource no longer exists.
    #[error("Resource '{0}' no longer exists")]
    Missing(String),
    /// The resource's endpoint could not be reached.
    #[error("Resource '{resource}' is unreachable: {reason}")]
    Unreachable {
        /// Description of the resource.
        resource: String,
        /// Underlying failure.
        reason: String,
    },
    /// The persisted description is malformed or stale.
    #[error("Malformed placeholder: {0}")]
    Malformed(String),
    /// The rehydration was cancelled before it completed.
    #[error("Rehydration cancelled")]
    Cancelled,
    /// The completing side went away without delivering an outcome.
    #[error("Rehydration abandoned before completion")]
    Abandoned,
    /// No async runtime was available to run the reconstruction on.
    #[error("No async runtime available for rehydration")]
    NoRuntime,
    /// Any other reconstruction failure.
    #[error("Rehydration failed: {0}")]
    Failed(String),
}

/// Errors from the non-resolution parts of a handle: storage roots and hosts.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The work unit driving the execution cannot currently be determined.
    #[error("Host work unit unavailable: {0}")]
    HostUnavailable(String),
    /// The store the handle was bound to has shut down.
    #[error("Execution store unavailable: {0}")]
    StoreUnavailable(String),
    /// The handle's identity cannot name a location.
    #[error("Invalid handle identity: {0}")]
    InvalidIdentity(String),
}

/// Errors from encoding records and looking up their decoders.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A decoder for this kind was already registered.
    #[error("Duplicate kind: '{0}'")]
    DuplicateKind(String),
    /// No decoder is registered for this kind.
    #[error("Kind '{0}' not found in registry")]
    UnknownKind(String),
    /// The record payload did not match the registered type.
    #[error("Invalid payload for kind '{kind}': {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
