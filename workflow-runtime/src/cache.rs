//! Process-wide cache of live executions.
//!
//! There is at most one live execution per id. Concurrent resolvers of the
//! same id share a single reconstruction: the first caller runs the loader and
//! the others wait for its result. A failed load leaves nothing behind, so the
//! next caller tries again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use workflow_core::error::ResolutionError;
use workflow_core::execution::{Execution, ExecutionId};

type Entry = Arc<OnceCell<Arc<dyn Execution>>>;

#[derive(Default)]
pub struct ExecutionCache {
    entries: Mutex<HashMap<ExecutionId, Entry>>,
}

impl ExecutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ExecutionId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The resident execution for `id`, if it is loaded.
    pub fn get(&self, id: &ExecutionId) -> Option<Arc<dyn Execution>> {
        self.entries().get(id).and_then(|cell| cell.get().cloned())
    }

    /// The resident execution for `id`, loading it with `load` if needed.
    pub async fn get_or_load<F, Fut>(
        &self,
        id: &ExecutionId,
        load: F,
    ) -> Result<Arc<dyn Execution>, ResolutionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Execution>, ResolutionError>>,
    {
        let cell = Arc::clone(self.entries().entry(id.clone()).or_default());
        if let Some(execution) = cell.get() {
            tracing::trace!(execution_id = %id, "Execution cache hit");
            return Ok(Arc::clone(execution));
        }
        let loaded = cell
            .get_or_try_init(move || async move {
                tracing::debug!(execution_id = %id, "Loading execution");
                load().await
            })
            .await
            .cloned();
        if loaded.is_err() {
            self.discard_empty(id, &cell);
        }
        loaded
    }

    /// Drop the entry for `id` if it is still `cell` and nothing was loaded
    /// into it. A concurrent caller may have replaced or filled it since.
    fn discard_empty(&self, id: &ExecutionId, cell: &Entry) {
        let mut entries = self.entries();
        let stale = entries
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            entries.remove(id);
        }
    }

    /// Drop the resident instance for `id`.
    pub fn evict(&self, id: &ExecutionId) -> Option<Arc<dyn Execution>> {
        self.entries()
            .remove(id)
            .and_then(|cell| cell.get().cloned())
    }

    /// Number of resident executions.
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tracked ids, loads in flight included.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use workflow_core::handle::ExecutionHandle;

    #[derive(Debug)]
    struct Bare(ExecutionId);

    impl Execution for Bare {
        fn id(&self) -> &ExecutionId {
            &self.0
        }

        fn handle(&self) -> Arc<dyn ExecutionHandle> {
            unimplemented!("not needed by cache tests")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loads_share_one_reconstruction() {
        let cache = Arc::new(ExecutionCache::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let loads = Arc::clone(&loads);
                tokio::spawn(async move {
                    let id = ExecutionId::new("a/1");
                    cache
                        .get_or_load(&id, || async {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(Arc::new(Bare(ExecutionId::new("a/1"))) as Arc<dyn Execution>)
                        })
                        .await
                })
            })
            .collect();

        let mut resolved = Vec::new();
        for task in tasks {
            resolved.push(task.await.unwrap().unwrap());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(resolved.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let cache = ExecutionCache::new();
        let id = ExecutionId::new("a/1");

        let first = cache
            .get_or_load(&id, || async {
                Err(ResolutionError::StorageUnavailable("offline".to_string()))
            })
            .await;
        assert!(first.is_err());
        assert!(cache.get(&id).is_none());

        let second = cache
            .get_or_load(&id, || async {
                Ok(Arc::new(Bare(ExecutionId::new("a/1"))) as Arc<dyn Execution>)
            })
            .await;
        assert!(second.is_ok());
        assert!(cache.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_failed_loads_leave_no_entries() {
        let cache = ExecutionCache::new();
        for n in 0..100 {
            let id = ExecutionId::new(format!("missing/{}", n));
            let result = cache
                .get_or_load(&id, || async {
                    Err(ResolutionError::NotFound(ExecutionId::new("missing")))
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(cache.tracked(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_evict() {
        let cache = ExecutionCache::new();
        let id = ExecutionId::new("a/1");
        let loaded = cache
            .get_or_load(&id, || async {
                Ok(Arc::new(Bare(ExecutionId::new("a/1"))) as Arc<dyn Execution>)
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&cache.get(&id).unwrap(), &loaded));

        assert!(cache.evict(&id).is_some());
        assert!(cache.is_empty());
        assert_eq!(cache.tracked(), 0);
    }
}
