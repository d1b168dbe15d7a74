use crate::handle::ExecutionHandle;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

/// A unique identifier for an execution.
///
/// Stable across restarts: it is what snapshots are keyed by and what a
/// handle ultimately resolves through.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExecutionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ExecutionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The live, stateful object of an in-progress execution.
///
/// Implemented by the execution engine. There is at most one live instance per
/// [`ExecutionId`] in a process; the engine synchronizes its own internals.
pub trait Execution: Debug + Send + Sync {
    fn id(&self) -> &ExecutionId;

    /// The durable handle denoting this execution.
    fn handle(&self) -> Arc<dyn ExecutionHandle>;
}
