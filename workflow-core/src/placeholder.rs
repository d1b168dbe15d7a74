//! Serializable stand-ins for live resources.
//!
//! Some objects referenced from an execution's state cannot be persisted: an
//! open file, a network connection, a client for an external service. At save
//! time the persistence layer replaces each of them with a [`Placeholder`]
//! carrying just enough description to rebuild the resource. On resume every
//! placeholder is asked to rehydrate, and the resume driver waits on the
//! resulting [`PendingResource`]s.
//!
//! A placeholder never holds the live resource it stands for.

use crate::error::RehydrationError;
use crate::pending::{LiveResource, PendingResource, RehydrationState};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::OnceLock;

/// Lifecycle of a single placeholder instance.
///
/// `Created -> RehydrationRequested -> {Resolved, Failed, Cancelled}`. There is
/// no way back to `Created`: retrying takes a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderState {
    Created,
    RehydrationRequested,
    Resolved,
    Failed,
    Cancelled,
}

/// A durable stand-in for a live resource that cannot be serialized.
pub trait Placeholder: Debug + Send + Sync {
    /// Kind under which this placeholder's [`PlaceholderRecord`] is registered.
    fn kind(&self) -> &'static str;

    /// Serializable form of this placeholder.
    fn to_record(&self) -> Result<PlaceholderRecord, serde_json::Error>;

    /// Start reconstructing the described resource.
    ///
    /// Implementations must return quickly and must not acquire locks here:
    /// all blocking work, locking included, belongs inside the returned
    /// pending resource. Failures are delivered through it, never returned
    /// from this call. The one permitted wait is the one-time claim of a
    /// [`RehydrationCell`], which lasts only as long as spawning the work.
    ///
    /// Calling this again on the same instance returns the same pending
    /// resource, whether it is still in flight or already settled.
    fn begin_rehydrate(&self) -> PendingResource;

    fn state(&self) -> PlaceholderState;
}

/// Serialized form of a [`Placeholder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderRecord {
    pub kind: String,
    pub payload: serde_json::Value,
}

impl PlaceholderRecord {
    /// Encode `value` as the payload of a record of the given kind.
    pub fn encode<T: Serialize>(kind: &str, value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.to_string(),
            payload: serde_json::to_value(value)?,
        })
    }
}

/// Per-instance rehydration state for placeholder implementations.
///
/// Embed it with `#[serde(skip)]`; clones and deserialized copies start out
/// [`Created`](PlaceholderState::Created).
#[derive(Default)]
pub struct RehydrationCell {
    pending: OnceLock<PendingResource>,
}

impl RehydrationCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the reconstruction produced by `start`, or return the one already
    /// started on this cell.
    ///
    /// `start` only builds the future; it runs on a detached task.
    ///
    /// A call racing the first one waits until that call has spawned its
    /// task, never for the reconstruction itself, and then shares its
    /// pending resource.
    pub fn begin<F, Fut>(&self, start: F) -> PendingResource
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LiveResource, RehydrationError>> + Send + 'static,
    {
        self.pending
            .get_or_init(|| PendingResource::spawn(start()))
            .clone()
    }

    pub fn pending(&self) -> Option<&PendingResource> {
        self.pending.get()
    }

    pub fn state(&self) -> PlaceholderState {
        match self.pending.get().map(PendingResource::state) {
            None => PlaceholderState::Created,
            Some(RehydrationState::Requested) => PlaceholderState::RehydrationRequested,
            Some(RehydrationState::Resolved) => PlaceholderState::Resolved,
            Some(RehydrationState::Failed) => PlaceholderState::Failed,
            Some(RehydrationState::Cancelled) => PlaceholderState::Cancelled,
        }
    }
}

impl Clone for RehydrationCell {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Debug for RehydrationCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RehydrationCell")
            .field("state", &self.state())
            .finish()
    }
}
