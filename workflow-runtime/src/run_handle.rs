//! Handles for executions driven by job runs.

use crate::store::ExecutionStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use workflow_core::error::{HandleError, ResolutionError};
use workflow_core::execution::{Execution, ExecutionId};
use workflow_core::handle::{ExecutionHandle, HandleRecord};
use workflow_core::host::HostWorkUnit;

/// Identity of a job run: the (possibly nested) job name and the run number.
///
/// Nested jobs use `/` as separator, e.g. `team/app`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub job: String,
    pub number: u64,
}

impl RunKey {
    pub fn new(job: impl Into<String>, number: u64) -> Self {
        Self {
            job: job.into(),
            number,
        }
    }

    /// Id under which the run's execution is persisted.
    pub fn execution_id(&self) -> ExecutionId {
        ExecutionId::new(format!("{}/{}", self.job, self.number))
    }

    /// The job name split into its nested folders.
    ///
    /// Empty, `.` and `..` segments cannot name a folder and are rejected.
    pub fn segments(&self) -> Result<Vec<&str>, HandleError> {
        let segments: Vec<&str> = self.job.split('/').collect();
        if segments
            .iter()
            .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
        {
            return Err(HandleError::InvalidIdentity(format!(
                "invalid job name '{}'",
                self.job
            )));
        }
        Ok(segments)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.job, self.number)
    }
}

/// [`ExecutionHandle`] of the execution driven by one job run.
///
/// Persisted as its [`RunKey`]. The store it resolves through is held weakly
/// and plays no part in equality or hashing.
#[derive(Clone)]
pub struct RunHandle {
    key: RunKey,
    store: Weak<ExecutionStore>,
}

impl RunHandle {
    pub const KIND: &'static str = "run";

    pub fn new(key: RunKey, store: Weak<ExecutionStore>) -> Self {
        Self { key, store }
    }

    /// A handle not bound to any store. It compares like any other handle
    /// but cannot resolve.
    pub fn detached(key: RunKey) -> Self {
        Self::new(key, Weak::new())
    }

    pub fn key(&self) -> &RunKey {
        &self.key
    }

    fn store(&self) -> Option<Arc<ExecutionStore>> {
        self.store.upgrade()
    }

    fn bound_store(&self) -> Result<Arc<ExecutionStore>, HandleError> {
        self.store()
            .ok_or_else(|| HandleError::StoreUnavailable(format!("{} is not bound", self.key)))
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("job", &self.key.job)
            .field("number", &self.key.number)
            .finish()
    }
}

impl PartialEq for RunHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RunHandle {}

impl Hash for RunHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

#[async_trait]
impl ExecutionHandle for RunHandle {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Result<HandleRecord, serde_json::Error> {
        HandleRecord::encode(Self::KIND, &self.key)
    }

    async fn resolve(&self) -> Result<Arc<dyn Execution>, ResolutionError> {
        let store = self.store().ok_or_else(|| {
            ResolutionError::StorageUnavailable(format!("store for {} has shut down", self.key))
        })?;
        store.resolve(&self.key).await
    }

    async fn storage_root(&self) -> Result<PathBuf, HandleError> {
        let segments = self.key.segments()?;
        let store = self.bound_store()?;
        let mut root = store.config().root_dir.clone();
        for segment in segments {
            root.push("jobs");
            root.push(segment);
        }
        root.push("builds");
        root.push(self.key.number.to_string());

        tokio::fs::create_dir_all(&root).await?;
        Ok(root)
    }

    fn host_executable(&self) -> Result<Arc<dyn HostWorkUnit>, HandleError> {
        self.bound_store()?
            .queue()
            .driver_of(self)
            .ok_or_else(|| HandleError::HostUnavailable(format!("{} is not scheduled", self.key)))
    }

    fn routing_path(&self) -> Result<String, HandleError> {
        let segments = self.key.segments()?;
        let store = self.bound_store()?;
        let prefix = &store.config().view_prefix;
        let mut path = String::new();
        for segment in segments {
            path.push_str(prefix);
            path.push('/');
            path.push_str(segment);
            path.push('/');
        }
        path.push_str(&self.key.number.to_string());
        path.push('/');
        Ok(path)
    }
}
