//! Runtime side of durable executions: the store run handles resolve through,
//! the process-wide execution cache, and the resume driver that rehydrates
//! placeholders.
//!
//! # Example
//!
//! ```rust,ignore
//! use workflow_runtime::{ExecutionStore, RunKey, RuntimeConfig};
//! use workflow_persistence::FileBackend;
//!
//! let backend = FileBackend::open("/var/lib/flows/snapshots").await?;
//! let store = ExecutionStore::new(RuntimeConfig::default(), backend, MyLoader)?;
//!
//! // After a restart, every persisted execution is picked up again.
//! for handle in store.persisted_handles().await? {
//!     let execution = handle.resolve().await?;
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod pickles;
pub mod resume;
pub mod run_handle;
pub mod store;
pub mod work_queue;

// Re-exports
pub use cache::ExecutionCache;
pub use config::{ResumeOptions, ResumePolicy, RuntimeConfig};
pub use error::RuntimeError;
pub use resume::{RehydratedResources, rehydrate_all};
pub use run_handle::{RunHandle, RunKey};
pub use store::{ExecutionLoader, ExecutionStore, ResumedExecution};
pub use work_queue::{RunUnit, WorkQueue};

pub use workflow_persistence as persistence;
