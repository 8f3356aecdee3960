//! Change events and the process-wide hub of streamers.
//!
//! Every mutation that commits, and every runtime artifact, flows
//! through exactly one [`ChangeEvent`] variant into the streamer for
//! its family. Topics are scoping ids: workspace id for flows, flow
//! id for everything owned by a flow. Subscribers filter on the
//! topics their caller can access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Id;
use crate::model::{
    Edge, Flow, FlowVariable, HttpResponse, Node, NodeCondition, NodeExecution, NodeFor,
    NodeForEach, NodeHttp, NodeJs, NodeNoOp, ResponseAssert, ResponseHeader,
};
use crate::stream::Streamer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One observed mutation of one item.
///
/// Insert and update carry the item. Delete carries only the id. An
/// update with `item: None` is an invalidation: the subscriber should
/// re-fetch the record (used when a sub-config row is deleted while
/// already absent, and when a parent arrives after its sub-config).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change<T> {
    pub kind: ChangeKind,
    pub id: Id,
    pub item: Option<T>,
}

impl<T> Change<T> {
    pub fn insert(id: Id, item: T) -> Self {
        Self {
            kind: ChangeKind::Insert,
            id,
            item: Some(item),
        }
    }

    pub fn update(id: Id, item: T) -> Self {
        Self {
            kind: ChangeKind::Update,
            id,
            item: Some(item),
        }
    }

    pub fn invalidate(id: Id) -> Self {
        Self {
            kind: ChangeKind::Update,
            id,
            item: None,
        }
    }

    pub fn delete(id: Id) -> Self {
        Self {
            kind: ChangeKind::Delete,
            id,
            item: None,
        }
    }
}

/// Advisory run log line for UI consoles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub flow_id: Id,
    pub node_id: Option<Id>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Every event the system can publish, tagged with its scoping topic.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ChangeEvent {
    Flow {
        workspace_id: Id,
        change: Change<Flow>,
    },
    Node {
        flow_id: Id,
        change: Change<Node>,
    },
    Edge {
        flow_id: Id,
        change: Change<Edge>,
    },
    Variable {
        flow_id: Id,
        change: Change<FlowVariable>,
    },
    NodeHttp {
        flow_id: Id,
        change: Change<NodeHttp>,
    },
    NodeCondition {
        flow_id: Id,
        change: Change<NodeCondition>,
    },
    NodeFor {
        flow_id: Id,
        change: Change<NodeFor>,
    },
    NodeForEach {
        flow_id: Id,
        change: Change<NodeForEach>,
    },
    NodeJs {
        flow_id: Id,
        change: Change<NodeJs>,
    },
    NodeNoOp {
        flow_id: Id,
        change: Change<NodeNoOp>,
    },
    Execution {
        flow_id: Id,
        change: Change<NodeExecution>,
    },
    Response {
        flow_id: Id,
        change: Change<HttpResponse>,
    },
    ResponseHeader {
        flow_id: Id,
        change: Change<ResponseHeader>,
    },
    ResponseAssert {
        flow_id: Id,
        change: Change<ResponseAssert>,
    },
    Log {
        flow_id: Id,
        entry: LogEntry,
    },
}

impl ChangeEvent {
    /// The scoping id used as the streamer topic.
    pub fn topic(&self) -> Id {
        match self {
            Self::Flow { workspace_id, .. } => *workspace_id,
            Self::Node { flow_id, .. }
            | Self::Edge { flow_id, .. }
            | Self::Variable { flow_id, .. }
            | Self::NodeHttp { flow_id, .. }
            | Self::NodeCondition { flow_id, .. }
            | Self::NodeFor { flow_id, .. }
            | Self::NodeForEach { flow_id, .. }
            | Self::NodeJs { flow_id, .. }
            | Self::NodeNoOp { flow_id, .. }
            | Self::Execution { flow_id, .. }
            | Self::Response { flow_id, .. }
            | Self::ResponseHeader { flow_id, .. }
            | Self::ResponseAssert { flow_id, .. }
            | Self::Log { flow_id, .. } => *flow_id,
        }
    }
}

/// Process-lifetime bundle of one streamer per event family.
///
/// Constructed once at startup and passed into the service layer as
/// an explicit dependency — never an ambient global.
pub struct EventHub {
    pub flows: Streamer<Id, Change<Flow>>,
    pub nodes: Streamer<Id, Change<Node>>,
    pub edges: Streamer<Id, Change<Edge>>,
    pub variables: Streamer<Id, Change<FlowVariable>>,
    pub node_http: Streamer<Id, Change<NodeHttp>>,
    pub node_condition: Streamer<Id, Change<NodeCondition>>,
    pub node_for: Streamer<Id, Change<NodeFor>>,
    pub node_for_each: Streamer<Id, Change<NodeForEach>>,
    pub node_js: Streamer<Id, Change<NodeJs>>,
    pub node_no_op: Streamer<Id, Change<NodeNoOp>>,
    pub executions: Streamer<Id, Change<NodeExecution>>,
    pub responses: Streamer<Id, Change<HttpResponse>>,
    pub response_headers: Streamer<Id, Change<ResponseHeader>>,
    pub response_asserts: Streamer<Id, Change<ResponseAssert>>,
    pub logs: Streamer<Id, LogEntry>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            flows: Streamer::new("flow"),
            nodes: Streamer::new("node"),
            edges: Streamer::new("edge"),
            variables: Streamer::new("flow_variable"),
            node_http: Streamer::new("node_http"),
            node_condition: Streamer::new("node_condition"),
            node_for: Streamer::new("node_for"),
            node_for_each: Streamer::new("node_for_each"),
            node_js: Streamer::new("node_js"),
            node_no_op: Streamer::new("node_no_op"),
            executions: Streamer::new("node_execution"),
            responses: Streamer::new("http_response"),
            response_headers: Streamer::new("http_response_header"),
            response_asserts: Streamer::new("http_response_assert"),
            logs: Streamer::new("log"),
        }
    }

    /// Route one event to the streamer for its family.
    pub async fn publish(&self, event: ChangeEvent) {
        let topic = event.topic();
        match event {
            ChangeEvent::Flow { change, .. } => self.flows.publish(topic, change).await,
            ChangeEvent::Node { change, .. } => self.nodes.publish(topic, change).await,
            ChangeEvent::Edge { change, .. } => self.edges.publish(topic, change).await,
            ChangeEvent::Variable { change, .. } => self.variables.publish(topic, change).await,
            ChangeEvent::NodeHttp { change, .. } => self.node_http.publish(topic, change).await,
            ChangeEvent::NodeCondition { change, .. } => {
                self.node_condition.publish(topic, change).await
            }
            ChangeEvent::NodeFor { change, .. } => self.node_for.publish(topic, change).await,
            ChangeEvent::NodeForEach { change, .. } => {
                self.node_for_each.publish(topic, change).await
            }
            ChangeEvent::NodeJs { change, .. } => self.node_js.publish(topic, change).await,
            ChangeEvent::NodeNoOp { change, .. } => self.node_no_op.publish(topic, change).await,
            ChangeEvent::Execution { change, .. } => self.executions.publish(topic, change).await,
            ChangeEvent::Response { change, .. } => self.responses.publish(topic, change).await,
            ChangeEvent::ResponseHeader { change, .. } => {
                self.response_headers.publish(topic, change).await
            }
            ChangeEvent::ResponseAssert { change, .. } => {
                self.response_asserts.publish(topic, change).await
            }
            ChangeEvent::Log { entry, .. } => self.logs.publish(topic, entry).await,
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
