//! Executable graph built from authoring state at run start.
//!
//! Validation is front-loaded so the scheduler can index nodes and
//! sub-configs without re-checking: exactly one start vertex, every
//! edge endpoint present, every non-trivial kind carrying its
//! sub-config, and request nodes referencing a real definition.

use std::collections::HashMap;

use crate::id::Id;
use crate::model::{Edge, EdgeHandle, Node, NodeKind};
use crate::runner::NodeConfigs;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GraphError {
    #[error("flow has no start node")]
    MissingStart,

    #[error("flow has {count} start nodes, expected exactly one")]
    MultipleStart { count: usize },

    #[error("node {node_id} has kind {kind:?} but no sub-config")]
    MissingConfig { node_id: Id, kind: NodeKind },

    #[error("request node {node_id} references no http definition")]
    MissingHttpDefinition { node_id: Id },

    #[error("edge {edge_id} references a node outside the flow")]
    DanglingEdge { edge_id: Id },

    #[error("node {node_id} has unsupported kind")]
    UnsupportedKind { node_id: Id },
}

/// Index over one flow's graph, valid for the duration of a run.
#[derive(Debug)]
pub struct RunGraph {
    start: Id,
    nodes: HashMap<Id, Node>,
    adjacency: HashMap<Id, Vec<(Id, EdgeHandle)>>,
}

impl RunGraph {
    pub fn build(nodes: &[Node], edges: &[Edge], configs: &NodeConfigs) -> Result<Self, GraphError> {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut starts = Vec::new();
        for node in nodes {
            match node.kind {
                NodeKind::Unspecified => {
                    return Err(GraphError::UnsupportedKind { node_id: node.id });
                }
                NodeKind::Start => starts.push(node.id),
                NodeKind::NoOp => {
                    if configs.no_op.get(&node.id).is_some_and(|c| c.is_start()) {
                        starts.push(node.id);
                    }
                }
                NodeKind::HttpRequest => {
                    let config = configs
                        .http
                        .get(&node.id)
                        .ok_or(GraphError::MissingConfig {
                            node_id: node.id,
                            kind: node.kind,
                        })?;
                    if config.http_id == Id::ZERO {
                        return Err(GraphError::MissingHttpDefinition { node_id: node.id });
                    }
                }
                NodeKind::Javascript => {
                    require(configs.js.contains_key(&node.id), node)?;
                }
                NodeKind::Condition => {
                    require(configs.condition.contains_key(&node.id), node)?;
                }
                NodeKind::ForCount => {
                    require(configs.for_count.contains_key(&node.id), node)?;
                }
                NodeKind::ForEach => {
                    require(configs.for_each.contains_key(&node.id), node)?;
                }
            }
            by_id.insert(node.id, node.clone());
        }

        let start = match starts.as_slice() {
            [] => return Err(GraphError::MissingStart),
            [single] => *single,
            many => {
                return Err(GraphError::MultipleStart { count: many.len() });
            }
        };

        let mut adjacency: HashMap<Id, Vec<(Id, EdgeHandle)>> = HashMap::new();
        for edge in edges {
            if !by_id.contains_key(&edge.source_node_id) || !by_id.contains_key(&edge.target_node_id)
            {
                return Err(GraphError::DanglingEdge { edge_id: edge.id });
            }
            adjacency
                .entry(edge.source_node_id)
                .or_default()
                .push((edge.target_node_id, edge.source_handle));
        }

        Ok(Self {
            start,
            nodes: by_id,
            adjacency,
        })
    }

    pub fn start(&self) -> Id {
        self.start
    }

    pub fn node(&self, id: Id) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Targets of outbound edges on the given handle, in edge order.
    pub fn successors(&self, id: Id, handle: EdgeHandle) -> Vec<Id> {
        self.adjacency
            .get(&id)
            .map(|targets| {
                targets
                    .iter()
                    .filter(|(_, h)| *h == handle)
                    .map(|(t, _)| *t)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn require(present: bool, node: &Node) -> Result<(), GraphError> {
    if present {
        Ok(())
    } else {
        Err(GraphError::MissingConfig {
            node_id: node.id,
            kind: node.kind,
        })
    }
}
