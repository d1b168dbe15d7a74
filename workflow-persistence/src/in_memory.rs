//! In-memory implementation of PersistentBackend.
//!
//! This is a simple implementation that stores snapshots in a HashMap.
//! Useful for testing and as a reference implementation.

use crate::backend::{BackendError, PersistentBackend};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use workflow_core::execution::ExecutionId;
use workflow_core::snapshot::ExecutionSnapshot;

/// In-memory backend that stores snapshots in a HashMap.
///
/// This implementation is thread-safe and suitable for testing. Snapshots do
/// not survive the process; use [`FileBackend`](crate::FileBackend) for that.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    snapshots: Arc<RwLock<HashMap<ExecutionId, ExecutionSnapshot>>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Backend(format!("Lock error: {}", e))
}

#[async_trait]
impl PersistentBackend for InMemoryBackend {
    async fn save_snapshot(&self, snapshot: ExecutionSnapshot) -> Result<(), BackendError> {
        let id = snapshot.execution_id.clone();
        let mut snapshots = self.snapshots.write().map_err(lock_error)?;
        snapshots.insert(id, snapshot);
        Ok(())
    }

    async fn load_snapshot(&self, id: &ExecutionId) -> Result<ExecutionSnapshot, BackendError> {
        let snapshots = self.snapshots.read().map_err(lock_error)?;
        snapshots
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn delete_snapshot(&self, id: &ExecutionId) -> Result<(), BackendError> {
        let mut snapshots = self.snapshots.write().map_err(lock_error)?;
        snapshots
            .remove(id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
            .map(|_| ())
    }

    async fn list_snapshots(&self) -> Result<Vec<ExecutionId>, BackendError> {
        let snapshots = self.snapshots.read().map_err(lock_error)?;
        Ok(snapshots.keys().cloned().collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use workflow_core::handle::HandleRecord;
    use workflow_core::placeholder::PlaceholderRecord;
    use workflow_core::snapshot::ExecutionStatus;

    pub(crate) fn snapshot(id: &str) -> ExecutionSnapshot {
        let mut placeholders = BTreeMap::new();
        placeholders.insert(
            "workspace".to_string(),
            PlaceholderRecord {
                kind: "file".to_string(),
                payload: serde_json::json!({ "path": "/tmp/workspace.lock" }),
            },
        );
        ExecutionSnapshot {
            execution_id: ExecutionId::new(id),
            handle: HandleRecord {
                kind: "run".to_string(),
                payload: serde_json::json!({ "job": "build", "number": 1 }),
            },
            state: serde_json::json!({ "step": 3 }),
            placeholders,
            status: ExecutionStatus::Suspended,
            created_at: 1,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let backend = InMemoryBackend::new();
        let snapshot = snapshot("build/1");

        backend.save_snapshot(snapshot.clone()).await.unwrap();
        let loaded = backend.load_snapshot(&"build/1".into()).await.unwrap();

        assert_eq!(snapshot.execution_id, loaded.execution_id);
        assert_eq!(snapshot.handle, loaded.handle);
        assert_eq!(loaded.placeholders["workspace"].kind, "file");
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let backend = InMemoryBackend::new();
        let mut snapshot = snapshot("build/1");
        backend.save_snapshot(snapshot.clone()).await.unwrap();

        snapshot.update_state(serde_json::json!({ "step": 4 }));
        backend.save_snapshot(snapshot).await.unwrap();

        let loaded = backend.load_snapshot(&"build/1".into()).await.unwrap();
        assert_eq!(loaded.state["step"], 4);
        assert_eq!(backend.list_snapshots().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_found() {
        let backend = InMemoryBackend::new();
        let result = backend.load_snapshot(&"nonexistent".into()).await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = InMemoryBackend::new();
        backend.save_snapshot(snapshot("build/1")).await.unwrap();
        backend.delete_snapshot(&"build/1".into()).await.unwrap();

        let result = backend.load_snapshot(&"build/1".into()).await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));

        let result = backend.delete_snapshot(&"build/1".into()).await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_snapshots() {
        let backend = InMemoryBackend::new();
        backend.save_snapshot(snapshot("build/1")).await.unwrap();
        backend.save_snapshot(snapshot("build/2")).await.unwrap();

        let list = backend.list_snapshots().await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&ExecutionId::new("build/1")));
        assert!(list.contains(&ExecutionId::new("build/2")));
    }
}
