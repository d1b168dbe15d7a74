//! Execution snapshot structures for suspend/resume.
//!
//! A snapshot is what storage backends persist for one execution: the record
//! of the handle that denotes it, the engine's opaque state, and the
//! placeholders that stand in for the live resources that state referenced.

use crate::execution::ExecutionId;
use crate::handle::{ExecutionHandle, HandleRecord};
use crate::placeholder::{Placeholder, PlaceholderRecord};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a persisted execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// The execution is running in some process.
    Running,
    /// The execution was suspended and waits to be resumed.
    Suspended,
    /// The execution finished successfully.
    Completed,
    /// The execution finished with an error.
    Failed {
        /// Error message.
        error: String,
    },
}

/// A complete snapshot of a suspended execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    /// Unique identifier of the execution.
    pub execution_id: ExecutionId,
    /// The handle denoting the execution, used to validate resolution.
    pub handle: HandleRecord,
    /// Engine state. Opaque to this crate.
    pub state: serde_json::Value,
    /// Placeholders captured from the state, by name.
    #[serde(default)]
    pub placeholders: BTreeMap<String, PlaceholderRecord>,
    pub status: ExecutionStatus,
    /// Timestamp when this snapshot was created (Unix timestamp).
    pub created_at: i64,
    /// Timestamp when this snapshot was last updated (Unix timestamp).
    pub updated_at: i64,
}

impl ExecutionSnapshot {
    fn current_timestamp() -> i64 {
        Utc::now().timestamp()
    }

    /// Create a new snapshot of a running execution.
    pub fn new(
        execution_id: ExecutionId,
        handle: &dyn ExecutionHandle,
        state: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let now = Self::current_timestamp();
        Ok(Self {
            execution_id,
            handle: handle.to_record()?,
            state,
            placeholders: BTreeMap::new(),
            status: ExecutionStatus::Running,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record `placeholder` under `name`, replacing any earlier capture.
    pub fn capture_placeholder(
        &mut self,
        name: impl Into<String>,
        placeholder: &dyn Placeholder,
    ) -> Result<(), serde_json::Error> {
        self.placeholders
            .insert(name.into(), placeholder.to_record()?);
        self.updated_at = Self::current_timestamp();
        Ok(())
    }

    /// Replace the engine state.
    pub fn update_state(&mut self, state: serde_json::Value) {
        self.state = state;
        self.updated_at = Self::current_timestamp();
    }

    pub fn mark_running(&mut self) {
        self.set_status(ExecutionStatus::Running);
    }

    pub fn mark_suspended(&mut self) {
        self.set_status(ExecutionStatus::Suspended);
    }

    /// Mark the execution as completed. Placeholders are dropped: nothing
    /// will resume it again.
    pub fn mark_completed(&mut self) {
        self.placeholders.clear();
        self.set_status(ExecutionStatus::Completed);
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.placeholders.clear();
        self.set_status(ExecutionStatus::Failed {
            error: error.into(),
        });
    }

    fn set_status(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.updated_at = Self::current_timestamp();
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, ExecutionStatus::Running)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.status, ExecutionStatus::Suspended)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, ExecutionStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExecutionStatus::Failed { .. })
    }

    /// Whether the execution can still be resumed.
    pub fn is_resumable(&self) -> bool {
        self.is_running() || self.is_suspended()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RehydrationError;
    use crate::pending::PendingResource;
    use crate::placeholder::{PlaceholderState, RehydrationCell};

    #[derive(Debug, Serialize)]
    struct Lock {
        path: String,
        #[serde(skip)]
        cell: RehydrationCell,
    }

    impl Placeholder for Lock {
        fn kind(&self) -> &'static str {
            "lock"
        }

        fn to_record(&self) -> Result<PlaceholderRecord, serde_json::Error> {
            PlaceholderRecord::encode(self.kind(), self)
        }

        fn begin_rehydrate(&self) -> PendingResource {
            PendingResource::failed(RehydrationError::Missing(self.path.clone()))
        }

        fn state(&self) -> PlaceholderState {
            self.cell.state()
        }
    }

    fn snapshot() -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: ExecutionId::new("build/1"),
            handle: HandleRecord {
                kind: "run".to_string(),
                payload: serde_json::json!({ "job": "build", "number": 1 }),
            },
            state: serde_json::Value::Null,
            placeholders: BTreeMap::new(),
            status: ExecutionStatus::Running,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_capture_placeholder() {
        let mut snapshot = snapshot();
        let lock = Lock {
            path: "/tmp/ws.lock".to_string(),
            cell: RehydrationCell::new(),
        };
        snapshot.capture_placeholder("workspace", &lock).unwrap();

        let record = &snapshot.placeholders["workspace"];
        assert_eq!(record.kind, "lock");
        assert_eq!(record.payload["path"], "/tmp/ws.lock");
        assert!(snapshot.updated_at > 0);
    }

    #[test]
    fn test_finishing_drops_placeholders() {
        let mut snapshot = snapshot();
        snapshot.placeholders.insert(
            "workspace".to_string(),
            PlaceholderRecord {
                kind: "lock".to_string(),
                payload: serde_json::Value::Null,
            },
        );
        snapshot.mark_suspended();
        assert!(snapshot.is_resumable());

        snapshot.mark_failed("agent lost");
        assert!(snapshot.is_failed());
        assert!(!snapshot.is_resumable());
        assert!(snapshot.placeholders.is_empty());
    }

    #[test]
    fn test_missing_placeholders_default_to_empty() {
        let mut value = serde_json::to_value(snapshot()).unwrap();
        value.as_object_mut().unwrap().remove("placeholders");
        let decoded: ExecutionSnapshot = serde_json::from_value(value).unwrap();
        assert!(decoded.placeholders.is_empty());
        assert!(decoded.is_running());
    }
}
