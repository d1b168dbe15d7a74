use crate::handle::ExecutionHandle;
use std::fmt::Debug;
use std::sync::Arc;

/// A scheduled unit of work, such as a job run.
///
/// Units that drive an execution expose the handle of that execution through
/// [`as_handle`](Self::as_handle), so tooling holding only a unit of work can
/// walk back to the durable handle without looking it up by name.
pub trait HostWorkUnit: Debug + Send + Sync {
    /// Human-readable name of the unit.
    fn display_name(&self) -> String;

    /// The handle of the execution this unit drives.
    ///
    /// `None` for units that never drive executions, or whose association was
    /// lost.
    fn as_handle(&self) -> Option<Arc<dyn ExecutionHandle>> {
        None
    }
}
