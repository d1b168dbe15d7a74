//! Error types for workflow-runtime.

use std::time::Duration;
use workflow_core::error::{HandleError, RegistryError, RehydrationError, ResolutionError};
use workflow_core::execution::ExecutionId;
use workflow_persistence::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Handle(#[from] HandleError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A snapshot already exists for an execution being started.
    #[error("Execution '{0}' already exists")]
    AlreadyExists(ExecutionId),
    /// The execution has finished and cannot be resumed.
    #[error("Execution '{0}' is not resumable")]
    NotResumable(ExecutionId),
    #[error("Cannot decode placeholder '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: RegistryError,
    },
    #[error("Placeholder '{name}' failed to rehydrate: {source}")]
    Rehydration {
        name: String,
        #[source]
        source: RehydrationError,
    },
    /// Rehydration did not finish in time; every outstanding placeholder was
    /// cancelled.
    #[error("Rehydration timed out after {0:?}")]
    TimedOut(Duration),
}
