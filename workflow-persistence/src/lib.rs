//! Persistence layer for suspended executions.
//!
//! This crate provides the storage side of suspend/resume: a
//! [`PersistentBackend`] trait plus two implementations.
//!
//! - **InMemoryBackend**: a reference implementation using a `HashMap`.
//! - **FileBackend**: one encoded file per execution under a directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use workflow_persistence::{FileBackend, PersistentBackend};
//!
//! let backend = FileBackend::open("/var/lib/flows/snapshots").await?;
//! backend.save_snapshot(snapshot).await?;
//! let loaded = backend.load_snapshot(&"job/7".into()).await?;
//! ```
//!
//! # Implementing Custom Backends
//!
//! 1. Add `workflow-persistence` as a dependency
//! 2. Implement the `PersistentBackend` trait
//! 3. Report undecodable snapshots as `BackendError::Serialization` so
//!    callers can tell corrupt state from unavailable storage

mod backend;
mod file;
mod in_memory;

pub use backend::{BackendError, PersistentBackend};
pub use file::FileBackend;
pub use in_memory::InMemoryBackend;
