//! The execution store: where run handles resolve.
//!
//! An [`ExecutionStore`] ties together a [`PersistentBackend`] holding
//! execution snapshots, the engine's [`ExecutionLoader`], the process-wide
//! [`ExecutionCache`] and the [`WorkQueue`] of runs driving executions. Every
//! [`RunHandle`] it hands out, or decodes from a record, resolves through it.

use crate::cache::ExecutionCache;
use crate::config::{ResumeOptions, ResumePolicy, RuntimeConfig};
use crate::error::RuntimeError;
use crate::pickles;
use crate::resume::{RehydratedResources, rehydrate_all};
use crate::run_handle::{RunHandle, RunKey};
use crate::work_queue::{RunUnit, WorkQueue};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use workflow_core::error::{RegistryError, RehydrationError, ResolutionError};
use workflow_core::execution::{Execution, ExecutionId};
use workflow_core::handle::{ExecutionHandle, HandleRecord};
use workflow_core::placeholder::Placeholder;
use workflow_core::registry::{HandleRegistry, PlaceholderRegistry, decode_payload};
use workflow_core::snapshot::ExecutionSnapshot;
use workflow_persistence::{BackendError, PersistentBackend};

/// Turns a persisted snapshot back into a live execution.
///
/// Implemented by the execution engine. Called at most once per resident
/// execution; the store caches the result.
#[async_trait]
pub trait ExecutionLoader: Send + Sync {
    async fn load(
        &self,
        snapshot: &ExecutionSnapshot,
        handle: Arc<dyn ExecutionHandle>,
    ) -> anyhow::Result<Arc<dyn Execution>>;
}

/// A resumed execution together with its rebuilt resources.
#[derive(Debug)]
pub struct ResumedExecution {
    pub execution: Arc<dyn Execution>,
    pub resources: RehydratedResources,
}

pub struct ExecutionStore {
    config: RuntimeConfig,
    backend: Arc<dyn PersistentBackend>,
    loader: Arc<dyn ExecutionLoader>,
    cache: ExecutionCache,
    placeholders: PlaceholderRegistry,
    handles: HandleRegistry,
    queue: WorkQueue,
    this: Weak<ExecutionStore>,
}

impl ExecutionStore {
    /// Create a store decoding the built-in placeholder kinds.
    pub fn new<B, L>(config: RuntimeConfig, backend: B, loader: L) -> Result<Arc<Self>, RegistryError>
    where
        B: PersistentBackend + 'static,
        L: ExecutionLoader + 'static,
    {
        let mut placeholders = PlaceholderRegistry::new();
        pickles::register_builtin(&mut placeholders)?;
        Self::with_placeholders(config, backend, loader, placeholders)
    }

    /// Create a store decoding placeholders with `placeholders`.
    pub fn with_placeholders<B, L>(
        config: RuntimeConfig,
        backend: B,
        loader: L,
        placeholders: PlaceholderRegistry,
    ) -> Result<Arc<Self>, RegistryError>
    where
        B: PersistentBackend + 'static,
        L: ExecutionLoader + 'static,
    {
        let backend: Arc<dyn PersistentBackend> = Arc::new(backend);
        let loader: Arc<dyn ExecutionLoader> = Arc::new(loader);
        let mut registered = Ok(());
        let store = Arc::new_cyclic(|this: &Weak<ExecutionStore>| {
            let mut handles = HandleRegistry::new();
            let weak = this.clone();
            registered = handles.register(RunHandle::KIND, move |payload| {
                let key: RunKey = decode_payload(RunHandle::KIND, payload)?;
                Ok(Arc::new(RunHandle::new(key, weak.clone())) as Arc<dyn ExecutionHandle>)
            });
            Self {
                config,
                backend,
                loader,
                cache: ExecutionCache::new(),
                placeholders,
                handles,
                queue: WorkQueue::new(),
                this: this.clone(),
            }
        });
        registered?;
        tracing::info!(
            root_dir = %store.config.root_dir.display(),
            placeholder_kinds = store.placeholders.len(),
            "Execution store ready"
        );
        Ok(store)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn cache(&self) -> &ExecutionCache {
        &self.cache
    }

    /// The handle of the run identified by `key`, bound to this store.
    pub fn handle(&self, key: RunKey) -> Arc<dyn ExecutionHandle> {
        Arc::new(self.run_handle(key))
    }

    pub fn run_handle(&self, key: RunKey) -> RunHandle {
        RunHandle::new(key, self.this.clone())
    }

    pub fn handle_registry(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Decode a persisted handle record into a handle bound to this store.
    pub fn decode_handle(
        &self,
        record: &HandleRecord,
    ) -> Result<Arc<dyn ExecutionHandle>, RegistryError> {
        self.handles.decode_handle(record)
    }

    /// Start a new execution for the run `key`.
    ///
    /// Persists the first snapshot, loads the live execution from it and
    /// schedules the run driving it. If the execution cannot be loaded, the
    /// snapshot is removed again so the run can be started afresh.
    pub async fn begin_execution(
        &self,
        key: RunKey,
        state: serde_json::Value,
        placeholders: &[(&str, &dyn Placeholder)],
    ) -> Result<Arc<dyn Execution>, RuntimeError> {
        key.segments()?;
        let id = key.execution_id();
        match self.backend.load_snapshot(&id).await {
            Ok(_) => return Err(RuntimeError::AlreadyExists(id)),
            Err(BackendError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let handle = self.handle(key.clone());
        let mut snapshot = ExecutionSnapshot::new(id.clone(), handle.as_ref(), state)?;
        for (name, placeholder) in placeholders {
            snapshot.capture_placeholder(*name, *placeholder)?;
        }
        self.backend.save_snapshot(snapshot).await?;

        let execution = match self.resolve(&key).await {
            Ok(execution) => execution,
            Err(e) => {
                tracing::warn!(execution_id = %id, error = %e, "Discarding unloadable execution");
                if let Err(cleanup) = self.backend.delete_snapshot(&id).await {
                    tracing::error!(execution_id = %id, error = %cleanup, "Failed to discard snapshot");
                }
                return Err(e.into());
            }
        };
        self.schedule(&key, handle);
        tracing::info!(execution_id = %id, "Execution started");
        Ok(execution)
    }

    /// The live execution of the run `key`, loading it if it is not resident.
    ///
    /// Concurrent callers share one load.
    pub async fn resolve(&self, key: &RunKey) -> Result<Arc<dyn Execution>, ResolutionError> {
        let id = key.execution_id();
        self.cache.get_or_load(&id, || self.load(key, &id)).await
    }

    async fn load(
        &self,
        key: &RunKey,
        id: &ExecutionId,
    ) -> Result<Arc<dyn Execution>, ResolutionError> {
        let snapshot = self
            .backend
            .load_snapshot(id)
            .await
            .map_err(|e| resolution_error(id, e))?;

        let handle = self.handle(key.clone());
        let expected = handle.to_record().map_err(|e| corrupt(id, e))?;
        if snapshot.handle != expected {
            return Err(corrupt(
                id,
                format!("snapshot belongs to handle {:?}", snapshot.handle),
            ));
        }

        let execution = self
            .loader
            .load(&snapshot, handle)
            .await
            .map_err(|e| corrupt(id, format!("{:#}", e)))?;
        if execution.id() != id {
            return Err(corrupt(
                id,
                format!("loader produced execution '{}'", execution.id()),
            ));
        }
        tracing::debug!(execution_id = %id, status = ?snapshot.status, "Execution loaded");
        Ok(execution)
    }

    /// Persist new engine state for a running execution, replacing its
    /// captured placeholders.
    pub async fn checkpoint(
        &self,
        key: &RunKey,
        state: serde_json::Value,
        placeholders: &[(&str, &dyn Placeholder)],
    ) -> Result<(), RuntimeError> {
        let id = key.execution_id();
        let mut snapshot = self.backend.load_snapshot(&id).await?;
        if !snapshot.is_resumable() {
            return Err(RuntimeError::NotResumable(id));
        }
        snapshot.update_state(state);
        snapshot.placeholders.clear();
        for (name, placeholder) in placeholders {
            snapshot.capture_placeholder(*name, *placeholder)?;
        }
        self.backend.save_snapshot(snapshot).await?;
        tracing::debug!(execution_id = %id, "Checkpoint saved");
        Ok(())
    }

    /// Mark the execution suspended and release it from this process.
    ///
    /// The run stops driving it and the live instance is evicted; a later
    /// [`resume`](Self::resume) rebuilds both.
    pub async fn suspend(&self, key: &RunKey) -> Result<(), RuntimeError> {
        let id = key.execution_id();
        let mut snapshot = self.backend.load_snapshot(&id).await?;
        if !snapshot.is_resumable() {
            return Err(RuntimeError::NotResumable(id));
        }
        snapshot.mark_suspended();
        self.backend.save_snapshot(snapshot).await?;

        self.queue.remove(&self.run_handle(key.clone()));
        self.cache.evict(&id);
        tracing::info!(execution_id = %id, "Execution suspended");
        Ok(())
    }

    /// Resume the run `key` with the configured resume options.
    pub async fn resume(&self, key: &RunKey) -> Result<ResumedExecution, RuntimeError> {
        self.resume_with(key, &self.config.resume).await
    }

    /// Resume the run `key`: resolve its execution, rehydrate every captured
    /// placeholder and schedule the run again.
    pub async fn resume_with(
        &self,
        key: &RunKey,
        options: &ResumeOptions,
    ) -> Result<ResumedExecution, RuntimeError> {
        let id = key.execution_id();
        let mut snapshot = self
            .backend
            .load_snapshot(&id)
            .await
            .map_err(|e| resolution_error(&id, e))?;
        if !snapshot.is_resumable() {
            return Err(RuntimeError::NotResumable(id));
        }

        let execution = self.resolve(key).await?;

        let mut placeholders: BTreeMap<String, Arc<dyn Placeholder>> = BTreeMap::new();
        let mut undecodable = BTreeMap::new();
        for (name, record) in &snapshot.placeholders {
            match self.placeholders.decode_placeholder(record) {
                Ok(placeholder) => {
                    placeholders.insert(name.clone(), placeholder);
                }
                Err(source) if options.policy == ResumePolicy::AbortOnFailure => {
                    return Err(RuntimeError::Decode {
                        name: name.clone(),
                        source,
                    });
                }
                Err(source) => {
                    tracing::warn!(placeholder = %name, error = %source, "Cannot decode placeholder");
                    undecodable.insert(name.clone(), RehydrationError::Malformed(source.to_string()));
                }
            }
        }

        let mut resources = match rehydrate_all(&placeholders, options).await {
            Ok(resources) => resources,
            Err(e) => {
                tracing::error!(execution_id = %id, error = %e, "Resume failed");
                return Err(e);
            }
        };
        resources.failures.extend(undecodable);

        snapshot.mark_running();
        self.backend.save_snapshot(snapshot).await?;
        let handle = execution.handle();
        if self.queue.driver_of(handle.as_ref()).is_none() {
            self.schedule(key, handle);
        }

        tracing::info!(
            execution_id = %id,
            resources = resources.resources.len(),
            failures = resources.failures.len(),
            "Execution resumed"
        );
        Ok(ResumedExecution {
            execution,
            resources,
        })
    }

    /// Record the final outcome of the run `key`.
    ///
    /// `Err` carries the failure message. The run is unscheduled and the live
    /// instance evicted.
    pub async fn complete(&self, key: &RunKey, outcome: Result<(), String>) -> Result<(), RuntimeError> {
        let id = key.execution_id();
        let mut snapshot = self.backend.load_snapshot(&id).await?;
        match outcome {
            Ok(()) => snapshot.mark_completed(),
            Err(error) => snapshot.mark_failed(error),
        }
        let status = snapshot.status.clone();
        self.backend.save_snapshot(snapshot).await?;

        self.queue.remove(&self.run_handle(key.clone()));
        self.cache.evict(&id);
        tracing::info!(execution_id = %id, status = ?status, "Execution finished");
        Ok(())
    }

    /// Handles of every execution currently driven by a scheduled run.
    pub fn handles(&self) -> Vec<Arc<dyn ExecutionHandle>> {
        self.queue.handles()
    }

    /// Handles of every persisted execution that can still be resumed.
    ///
    /// Snapshots that cannot be read or whose handle cannot be decoded are
    /// skipped with a warning.
    pub async fn persisted_handles(&self) -> Result<Vec<Arc<dyn ExecutionHandle>>, RuntimeError> {
        let mut handles = Vec::new();
        for id in self.backend.list_snapshots().await? {
            let snapshot = match self.backend.load_snapshot(&id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(execution_id = %id, error = %e, "Skipping unreadable snapshot");
                    continue;
                }
            };
            if !snapshot.is_resumable() {
                continue;
            }
            match self.decode_handle(&snapshot.handle) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!(execution_id = %id, error = %e, "Skipping undecodable handle");
                }
            }
        }
        Ok(handles)
    }

    fn schedule(&self, key: &RunKey, handle: Arc<dyn ExecutionHandle>) {
        self.queue
            .schedule(Arc::new(RunUnit::new(key.to_string(), handle)));
    }
}

fn resolution_error(id: &ExecutionId, error: BackendError) -> ResolutionError {
    match error {
        BackendError::NotFound(_) => ResolutionError::NotFound(id.clone()),
        BackendError::Serialization(reason) => corrupt(id, reason),
        BackendError::Backend(reason) => ResolutionError::StorageUnavailable(reason),
    }
}

fn corrupt(id: &ExecutionId, reason: impl ToString) -> ResolutionError {
    ResolutionError::Corrupt {
        id: id.clone(),
        reason: reason.to_string(),
    }
}
