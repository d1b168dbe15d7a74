//! Persistent backend trait for storing and retrieving execution snapshots.
//!
//! This trait abstracts the storage mechanism, allowing implementations
//! for various backends (in-memory, files, databases).

use async_trait::async_trait;
use workflow_core::execution::ExecutionId;
use workflow_core::snapshot::ExecutionSnapshot;

/// Error type for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    NotFound(String),
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Backend-specific error.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Trait for persistent storage of execution snapshots.
///
/// # Example
///
/// ```rust,ignore
/// use workflow_persistence::{PersistentBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.save_snapshot(snapshot).await?;
/// let restored = backend.load_snapshot(&"job/7".into()).await?;
/// ```
#[async_trait]
pub trait PersistentBackend: Send + Sync {
    /// Save an execution snapshot.
    ///
    /// If a snapshot with the same execution id already exists, it is overwritten.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the snapshot cannot be saved.
    async fn save_snapshot(&self, snapshot: ExecutionSnapshot) -> Result<(), BackendError>;

    /// Load an execution snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no snapshot exists for the given id,
    /// `BackendError::Serialization` if the stored snapshot cannot be decoded.
    async fn load_snapshot(&self, id: &ExecutionId) -> Result<ExecutionSnapshot, BackendError>;

    /// Delete an execution snapshot.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no snapshot exists for the given id.
    async fn delete_snapshot(&self, id: &ExecutionId) -> Result<(), BackendError>;

    /// List all stored execution ids.
    ///
    /// Returns an empty vector if no snapshots exist.
    async fn list_snapshots(&self) -> Result<Vec<ExecutionId>, BackendError>;
}
