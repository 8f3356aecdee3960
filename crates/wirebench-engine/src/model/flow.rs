//! Workspace and flow authoring entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Id;

/// Top-level tenancy unit. Membership in a workspace is the sole
/// authorization boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Id,
    pub name: String,
    /// Active environment bindings injected at the base of every run scope.
    pub active_env: serde_json::Value,
    pub global_env: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum WorkspaceRole {
    Unspecified = 0,
    Owner = 1,
    Admin = 2,
    Member = 3,
}

super::wire_enum!(WorkspaceRole, fallback = Unspecified, {
    1 => Owner,
    2 => Admin,
    3 => Member,
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceUser {
    pub workspace_id: Id,
    pub user_id: Id,
    pub role: WorkspaceRole,
}

/// A directed graph of nodes and edges; the unit of execution.
///
/// Invariants: exactly one start vertex; every edge references nodes
/// of the same flow; `running` is true iff a runner is active; a flow
/// with `version_parent_id` set is an immutable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub running: bool,
    pub duration_ms: Option<i64>,
    pub version_parent_id: Option<Id>,
}

/// A named value available at the base of the run scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowVariable {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    /// Fractional ordering key so the client can reorder without renumbering.
    pub order: f64,
}
