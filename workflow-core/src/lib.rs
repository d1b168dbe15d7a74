//! Durable execution handles and placeholder rehydration.
//!
//! Two cooperating contracts let a suspended execution survive a restart:
//!
//! - [`ExecutionHandle`]: a small serializable moniker that finds the live
//!   execution it denotes.
//! - [`Placeholder`]: a serializable stand-in for a live resource, rebuilt
//!   asynchronously through a [`PendingResource`] on resume.

pub mod codec;
pub mod error;
pub mod execution;
pub mod handle;
pub mod host;
pub mod pending;
pub mod placeholder;
pub mod registry;
pub mod serialization;
pub mod snapshot;

pub use error::{HandleError, RegistryError, RehydrationError, ResolutionError};
pub use execution::{Execution, ExecutionId};
pub use handle::{EXECUTION_VIEW_SUFFIX, ExecutionHandle, HandleIdentity, HandleRecord};
pub use host::HostWorkUnit;
pub use pending::{Completer, LiveResource, PendingResource, RehydrationState};
pub use placeholder::{Placeholder, PlaceholderRecord, PlaceholderState, RehydrationCell};
pub use registry::{HandleRegistry, KindRegistry, PlaceholderRegistry};
pub use snapshot::{ExecutionSnapshot, ExecutionStatus};
