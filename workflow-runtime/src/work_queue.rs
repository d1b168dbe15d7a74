//! Scheduled units of work and the reverse link to their executions.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use workflow_core::handle::ExecutionHandle;
use workflow_core::host::HostWorkUnit;

/// A job run driving one execution.
pub struct RunUnit {
    name: String,
    handle: Option<Arc<dyn ExecutionHandle>>,
}

impl RunUnit {
    pub fn new(name: impl Into<String>, handle: Arc<dyn ExecutionHandle>) -> Self {
        Self {
            name: name.into(),
            handle: Some(handle),
        }
    }

    /// A run that lost the association with its execution.
    pub fn detached(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
        }
    }
}

impl fmt::Debug for RunUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunUnit")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

impl HostWorkUnit for RunUnit {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn as_handle(&self) -> Option<Arc<dyn ExecutionHandle>> {
        self.handle.clone()
    }
}

/// The host's view of scheduled work units.
///
/// Holds units of any type; the ones able to drive an execution are found
/// through [`HostWorkUnit::as_handle`].
#[derive(Default)]
pub struct WorkQueue {
    units: RwLock<Vec<Arc<dyn HostWorkUnit>>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, unit: Arc<dyn HostWorkUnit>) {
        tracing::debug!(unit = %unit.display_name(), "Scheduled work unit");
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(unit);
    }

    /// Remove every unit driving the execution `handle` denotes.
    pub fn remove(&self, handle: &dyn ExecutionHandle) -> usize {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        let before = units.len();
        units.retain(|unit| !drives(unit.as_ref(), handle));
        before - units.len()
    }

    pub fn units(&self) -> Vec<Arc<dyn HostWorkUnit>> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handles of every execution currently driven by a scheduled unit.
    pub fn handles(&self) -> Vec<Arc<dyn ExecutionHandle>> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|unit| unit.as_handle())
            .collect()
    }

    /// The unit driving the execution `handle` denotes.
    pub fn driver_of(&self, handle: &dyn ExecutionHandle) -> Option<Arc<dyn HostWorkUnit>> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|unit| drives(unit.as_ref(), handle))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn drives(unit: &dyn HostWorkUnit, handle: &dyn ExecutionHandle) -> bool {
    unit.as_handle()
        .is_some_and(|driven| driven.as_ref() == handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_handle::{RunHandle, RunKey};

    #[derive(Debug)]
    struct Cleanup;

    impl HostWorkUnit for Cleanup {
        fn display_name(&self) -> String {
            "workspace cleanup".to_string()
        }
    }

    fn handle(job: &str, number: u64) -> Arc<dyn ExecutionHandle> {
        Arc::new(RunHandle::detached(RunKey::new(job, number)))
    }

    #[test]
    fn test_handles_skip_units_without_executions() {
        let queue = WorkQueue::new();
        queue.schedule(Arc::new(Cleanup));
        queue.schedule(Arc::new(RunUnit::detached("orphan #3")));
        queue.schedule(Arc::new(RunUnit::new("app #7", handle("app", 7))));

        assert_eq!(queue.len(), 3);
        let handles = queue.handles();
        assert_eq!(handles.len(), 1);
        assert!(handles[0] == handle("app", 7));
    }

    #[test]
    fn test_driver_lookup_by_identity() {
        let queue = WorkQueue::new();
        queue.schedule(Arc::new(RunUnit::new("app #7", handle("app", 7))));

        // A different instance denoting the same execution finds the driver.
        let driver = queue.driver_of(handle("app", 7).as_ref()).unwrap();
        assert_eq!(driver.display_name(), "app #7");
        assert!(queue.driver_of(handle("app", 8).as_ref()).is_none());

        assert_eq!(queue.remove(handle("app", 7).as_ref()), 1);
        assert!(queue.is_empty());
    }
}
