//! Durable handles to executions.
//!
//! An [`ExecutionHandle`] is a small serializable moniker that finds *the*
//! live [`Execution`] it denotes, even after the process that created it is
//! gone. It is not the execution itself: it can be copied into any other
//! object's persisted state and resolved lazily.
//!
//! # Identity
//!
//! Two handles are equal if and only if they denote the same execution.
//! Concrete handle types get this by implementing `Eq` and `Hash` over the
//! fields that identify the execution (never over caches or back-references),
//! which makes them [`HandleIdentity`] through a blanket impl. `dyn
//! ExecutionHandle` and `Arc<dyn ExecutionHandle>` then compare and hash by
//! that identity, so handles can key maps regardless of which instance
//! produced them.

use crate::error::{HandleError, ResolutionError};
use crate::execution::Execution;
use crate::host::HostWorkUnit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

/// Suffix appended to a handle's routing path to root its execution view.
pub const EXECUTION_VIEW_SUFFIX: &str = "execution/";

/// Structural identity of a handle, usable through a trait object.
///
/// Implemented for every `Eq + Hash` type; there is no need to implement it
/// by hand.
pub trait HandleIdentity: Any + Send + Sync {
    fn identity_any(&self) -> &dyn Any;

    /// Whether `other` is the same concrete type and denotes the same identity.
    fn identity_eq(&self, other: &dyn Any) -> bool;

    fn identity_hash(&self, state: &mut dyn Hasher);
}

impl<T> HandleIdentity for T
where
    T: Any + Eq + Hash + Send + Sync,
{
    fn identity_any(&self) -> &dyn Any {
        self
    }

    fn identity_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn identity_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// A durable reference that can locate a live execution.
#[async_trait]
pub trait ExecutionHandle: HandleIdentity + Debug {
    /// Kind under which this handle's [`HandleRecord`] is registered.
    fn kind(&self) -> &'static str;

    /// Serializable form of this handle.
    fn to_record(&self) -> Result<HandleRecord, serde_json::Error>;

    /// Find the live execution this handle denotes.
    ///
    /// May perform IO. Repeated calls return the same live instance as long as
    /// the execution stays resident.
    async fn resolve(&self) -> Result<Arc<dyn Execution>, ResolutionError>;

    /// Same as [`resolve`](Self::resolve), but logs failures instead of
    /// returning them.
    async fn resolve_or_none(&self) -> Option<Arc<dyn Execution>> {
        match self.resolve().await {
            Ok(execution) => Some(execution),
            Err(e) => {
                tracing::warn!(handle = ?self, error = %e, "Failed to resolve execution");
                None
            }
        }
    }

    /// A directory where this execution may persist its own artifacts.
    ///
    /// Created if it does not exist yet.
    async fn storage_root(&self) -> Result<PathBuf, HandleError>;

    /// The scheduled unit of work driving this execution, such as a job run.
    fn host_executable(&self) -> Result<Arc<dyn HostWorkUnit>, HandleError>;

    /// Path of the object owning the execution, relative to the system root.
    ///
    /// Something like `job/foo/32/`: trailing slash, no leading slash.
    fn routing_path(&self) -> Result<String, HandleError>;

    /// Path of the execution's own view.
    fn execution_view_path(&self) -> Result<String, HandleError> {
        Ok(format!("{}{}", self.routing_path()?, EXECUTION_VIEW_SUFFIX))
    }
}

impl PartialEq for dyn ExecutionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity_eq(other.identity_any())
    }
}

impl Eq for dyn ExecutionHandle {}

impl Hash for dyn ExecutionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity_hash(state);
    }
}

/// Serialized form of an [`ExecutionHandle`].
///
/// The payload is opaque to everything except the decoder registered for
/// `kind` in a [`HandleRegistry`](crate::registry::HandleRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleRecord {
    pub kind: String,
    pub payload: serde_json::Value,
}

impl HandleRecord {
    /// Encode `value` as the payload of a record of the given kind.
    pub fn encode<T: Serialize>(kind: &str, value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.to_string(),
            payload: serde_json::to_value(value)?,
        })
    }
}
