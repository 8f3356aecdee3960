//! Nodes, edges, and the typed per-kind sub-configs.

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// What a vertex does when the scheduler reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum NodeKind {
    Unspecified = 0,
    Start = 1,
    HttpRequest = 2,
    Javascript = 3,
    Condition = 4,
    ForCount = 5,
    ForEach = 6,
    NoOp = 7,
}

/// Last observed execution state, mirrored onto the authoring node so
/// the canvas can color vertices without joining execution records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum NodeState {
    #[default]
    Unspecified = 0,
    Running = 1,
    Success = 2,
    Failure = 3,
    Canceled = 4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub kind: NodeKind,
    pub pos_x: f64,
    pub pos_y: f64,
    pub state: NodeState,
}

/// Labeled port selecting which outbound edges fire for a runtime outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum EdgeHandle {
    #[default]
    Unspecified = 0,
    Then = 1,
    Else = 2,
    LoopBody = 3,
    LoopEnd = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum EdgeKind {
    #[default]
    Unspecified = 0,
    NoOp = 1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: Id,
    pub flow_id: Id,
    pub source_node_id: Id,
    pub target_node_id: Id,
    pub source_handle: EdgeHandle,
    pub kind: EdgeKind,
}

// ---------------------------------------------------------------------------
// Sub-configs (one record per node, keyed by node id)
// ---------------------------------------------------------------------------

/// How a loop reacts to a failing child subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ErrorHandling {
    #[default]
    Unspecified = 0,
    Break = 1,
    Ignore = 2,
}

/// Request node: references a shared HTTP definition plus an optional
/// per-node delta override. Definitions are shared by id and outlive
/// the nodes that reference them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHttp {
    pub node_id: Id,
    pub http_id: Id,
    pub delta_http_id: Option<Id>,
    pub has_request_config: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFor {
    pub node_id: Id,
    pub iter_count: i64,
    /// Re-evaluated each iteration as a while-guard when present.
    pub condition_expr: Option<String>,
    pub error_handling: ErrorHandling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeForEach {
    pub node_id: Id,
    /// Expression producing the iterable value.
    pub iter_expr: String,
    pub condition_expr: Option<String>,
    pub error_handling: ErrorHandling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCondition {
    pub node_id: Id,
    pub expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum CompressionKind {
    #[default]
    None = 0,
    Zstd = 1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeJs {
    pub node_id: Id,
    pub code: Vec<u8>,
    pub compression_kind: CompressionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum NoOpKind {
    #[default]
    Unspecified = 0,
    Start = 1,
    ManualStart = 2,
    Loop = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeNoOp {
    pub node_id: Id,
    pub kind: NoOpKind,
}

wire_enum!(NodeKind, fallback = Unspecified, {
    1 => Start,
    2 => HttpRequest,
    3 => Javascript,
    4 => Condition,
    5 => ForCount,
    6 => ForEach,
    7 => NoOp,
});

wire_enum!(NodeState, fallback = Unspecified, {
    1 => Running,
    2 => Success,
    3 => Failure,
    4 => Canceled,
});

wire_enum!(EdgeHandle, fallback = Unspecified, {
    1 => Then,
    2 => Else,
    3 => LoopBody,
    4 => LoopEnd,
});

wire_enum!(EdgeKind, fallback = Unspecified, {
    1 => NoOp,
});

wire_enum!(ErrorHandling, fallback = Unspecified, {
    1 => Break,
    2 => Ignore,
});

wire_enum!(CompressionKind, fallback = None, {
    1 => Zstd,
});

wire_enum!(NoOpKind, fallback = Unspecified, {
    1 => Start,
    2 => ManualStart,
    3 => Loop,
});

impl Node {
    /// Whether this node can anchor a run. Start-kind vertices qualify
    /// directly; no_op vertices qualify through their sub-config.
    pub fn is_start_kind(&self) -> bool {
        matches!(self.kind, NodeKind::Start)
    }
}

impl NodeNoOp {
    pub fn is_start(&self) -> bool {
        matches!(self.kind, NoOpKind::Start | NoOpKind::ManualStart)
    }
}
