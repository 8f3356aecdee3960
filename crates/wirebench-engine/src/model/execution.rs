//! Execution records — one upserted row per node per iteration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ExecutionState {
    #[default]
    Unspecified = 0,
    Running = 1,
    Success = 2,
    Failure = 3,
    Canceled = 4,
}

/// One runtime invocation of one node within one flow run (or one
/// loop iteration). Every state change upserts the same record: the
/// id is allocated once when the node is first reached and reused for
/// the running and terminal events of that invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: Id,
    pub node_id: Id,
    pub name: String,
    pub state: ExecutionState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub input: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,
    /// Set for request nodes once the response artifact is persisted.
    pub response_id: Option<Id>,
}

super::wire_enum!(ExecutionState, fallback = Unspecified, {
    1 => Running,
    2 => Success,
    3 => Failure,
    4 => Canceled,
});

impl NodeExecution {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ExecutionState::Success | ExecutionState::Failure | ExecutionState::Canceled
        )
    }
}
