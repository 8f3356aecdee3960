//! Flow CRUD, duplicate, run, and stop.

use std::collections::HashMap;

use wirebench_engine::event::{Change, ChangeEvent};
use wirebench_engine::model::{
    Edge, Flow, FlowVariable, Node, NodeCondition, NodeFor, NodeForEach, NodeHttp, NodeJs,
    NodeKind, NodeNoOp, NodeState, NoOpKind,
};
use wirebench_engine::runner::RunOutcome;
use wirebench_engine::Id;

use wirebench_storage::stores::{
    edge_store, flow_store, node_config_store, node_store, variable_store,
};
use wirebench_storage::ChangeTxn;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

use super::require_id;

#[derive(Debug, Clone, Default)]
pub struct FlowPatch {
    pub id: Id,
    pub name: Option<String>,
}

pub async fn collection(state: &AppState, caller: &Caller) -> Result<Vec<Flow>, RpcError> {
    access::list_accessible_flows(&state.db, caller).await
}

/// Insert flows. Each new flow gets its start vertex (a `no_op` of
/// subtype `manual_start`, named "Start") in the same transaction.
pub async fn insert(state: &AppState, caller: &Caller, items: Vec<Flow>) -> Result<(), RpcError> {
    for item in &items {
        require_id(item.id, "flow")?;
        require_id(item.workspace_id, "workspace")?;
        access::ensure_workspace_access(&state.db, caller, item.workspace_id).await?;
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for item in &items {
        flow_store::insert(txn.conn(), item).await?;
        txn.track(ChangeEvent::Flow {
            workspace_id: item.workspace_id,
            change: Change::insert(item.id, item.clone()),
        });

        let start = Node {
            id: Id::generate(),
            flow_id: item.id,
            name: "Start".into(),
            kind: NodeKind::NoOp,
            pos_x: 0.0,
            pos_y: 0.0,
            state: NodeState::Unspecified,
        };
        let start_config = NodeNoOp {
            node_id: start.id,
            kind: NoOpKind::ManualStart,
        };
        node_store::insert(txn.conn(), &start).await?;
        node_config_store::no_op::insert(txn.conn(), &start_config).await?;
        txn.track(ChangeEvent::Node {
            flow_id: item.id,
            change: Change::insert(start.id, start),
        });
        txn.track(ChangeEvent::NodeNoOp {
            flow_id: item.id,
            change: Change::insert(start_config.node_id, start_config),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}

pub async fn update(
    state: &AppState,
    caller: &Caller,
    patches: Vec<FlowPatch>,
) -> Result<(), RpcError> {
    let mut targets = Vec::with_capacity(patches.len());
    for patch in &patches {
        require_id(patch.id, "flow")?;
        let mut flow = access::ensure_flow_mutable(&state.db, caller, patch.id).await?;
        if let Some(name) = &patch.name {
            flow.name = name.clone();
        }
        targets.push(flow);
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for flow in &targets {
        flow_store::update(txn.conn(), flow).await?;
        txn.track(ChangeEvent::Flow {
            workspace_id: flow.workspace_id,
            change: Change::update(flow.id, flow.clone()),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}

/// Delete flows and everything they contain. Child ids are prefetched
/// during validation so the write transaction performs no reads.
pub async fn delete(state: &AppState, caller: &Caller, ids: Vec<Id>) -> Result<(), RpcError> {
    struct Target {
        flow: Flow,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        variables: Vec<FlowVariable>,
    }

    let mut targets = Vec::with_capacity(ids.len());
    for id in ids {
        require_id(id, "flow")?;
        let flow = access::ensure_flow_access(&state.db, caller, id).await?;
        targets.push(Target {
            nodes: node_store::list_by_flow(&state.db, id).await?,
            edges: edge_store::list_by_flow(&state.db, id).await?,
            variables: variable_store::list_by_flow(&state.db, id).await?,
            flow,
        });
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for target in &targets {
        let flow_id = target.flow.id;
        let node_ids: Vec<Id> = target.nodes.iter().map(|n| n.id).collect();
        flow_store::delete_cascade(txn.conn(), flow_id, &node_ids).await?;

        for node in &target.nodes {
            txn.track(ChangeEvent::Node {
                flow_id,
                change: Change::delete(node.id),
            });
        }
        for edge in &target.edges {
            txn.track(ChangeEvent::Edge {
                flow_id,
                change: Change::delete(edge.id),
            });
        }
        for variable in &target.variables {
            txn.track(ChangeEvent::Variable {
                flow_id,
                change: Change::delete(variable.id),
            });
        }
        txn.track(ChangeEvent::Flow {
            workspace_id: target.flow.workspace_id,
            change: Change::delete(flow_id),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}

/// Atomic graph clone. Nodes, edges, variables, and sub-configs get
/// fresh ids; edges are rewired through the node mapping. HTTP
/// definitions are shared by id and are not cloned.
pub async fn duplicate(state: &AppState, caller: &Caller, flow_id: Id) -> Result<Flow, RpcError> {
    let source = access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let nodes = node_store::list_by_flow(&state.db, flow_id).await?;
    let edges = edge_store::list_by_flow(&state.db, flow_id).await?;
    let variables = variable_store::list_by_flow(&state.db, flow_id).await?;
    let http_configs = node_config_store::http::list_by_flow(&state.db, flow_id).await?;
    let condition_configs = node_config_store::condition::list_by_flow(&state.db, flow_id).await?;
    let for_configs = node_config_store::for_count::list_by_flow(&state.db, flow_id).await?;
    let for_each_configs = node_config_store::for_each::list_by_flow(&state.db, flow_id).await?;
    let js_configs = node_config_store::js::list_by_flow(&state.db, flow_id).await?;
    let no_op_configs = node_config_store::no_op::list_by_flow(&state.db, flow_id).await?;

    let copy = Flow {
        id: Id::generate(),
        workspace_id: source.workspace_id,
        name: source.name.clone(),
        running: false,
        duration_ms: None,
        version_parent_id: Some(source.id),
    };
    let node_map: HashMap<Id, Id> = nodes.iter().map(|n| (n.id, Id::generate())).collect();
    let mapped = |old: Id| -> Result<Id, RpcError> {
        node_map
            .get(&old)
            .copied()
            .ok_or_else(|| RpcError::invalid_argument("edge references a node outside the flow"))
    };

    let mut txn = ChangeTxn::begin(&state.db).await?;
    flow_store::insert(txn.conn(), &copy).await?;
    txn.track(ChangeEvent::Flow {
        workspace_id: copy.workspace_id,
        change: Change::insert(copy.id, copy.clone()),
    });

    for node in &nodes {
        let cloned = Node {
            id: node_map[&node.id],
            flow_id: copy.id,
            state: NodeState::Unspecified,
            ..node.clone()
        };
        node_store::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::Node {
            flow_id: copy.id,
            change: Change::insert(cloned.id, cloned),
        });
    }
    for edge in &edges {
        let cloned = Edge {
            id: Id::generate(),
            flow_id: copy.id,
            source_node_id: mapped(edge.source_node_id)?,
            target_node_id: mapped(edge.target_node_id)?,
            ..edge.clone()
        };
        edge_store::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::Edge {
            flow_id: copy.id,
            change: Change::insert(cloned.id, cloned),
        });
    }
    for variable in &variables {
        let cloned = FlowVariable {
            id: Id::generate(),
            flow_id: copy.id,
            ..variable.clone()
        };
        variable_store::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::Variable {
            flow_id: copy.id,
            change: Change::insert(cloned.id, cloned),
        });
    }

    for config in &http_configs {
        let cloned = NodeHttp {
            node_id: mapped(config.node_id)?,
            ..config.clone()
        };
        node_config_store::http::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::NodeHttp {
            flow_id: copy.id,
            change: Change::insert(cloned.node_id, cloned),
        });
    }
    for config in &condition_configs {
        let cloned = NodeCondition {
            node_id: mapped(config.node_id)?,
            ..config.clone()
        };
        node_config_store::condition::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::NodeCondition {
            flow_id: copy.id,
            change: Change::insert(cloned.node_id, cloned),
        });
    }
    for config in &for_configs {
        let cloned = NodeFor {
            node_id: mapped(config.node_id)?,
            ..config.clone()
        };
        node_config_store::for_count::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::NodeFor {
            flow_id: copy.id,
            change: Change::insert(cloned.node_id, cloned),
        });
    }
    for config in &for_each_configs {
        let cloned = NodeForEach {
            node_id: mapped(config.node_id)?,
            ..config.clone()
        };
        node_config_store::for_each::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::NodeForEach {
            flow_id: copy.id,
            change: Change::insert(cloned.node_id, cloned),
        });
    }
    for config in &js_configs {
        let cloned = NodeJs {
            node_id: mapped(config.node_id)?,
            ..config.clone()
        };
        node_config_store::js::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::NodeJs {
            flow_id: copy.id,
            change: Change::insert(cloned.node_id, cloned),
        });
    }
    for config in &no_op_configs {
        let cloned = NodeNoOp {
            node_id: mapped(config.node_id)?,
            ..config.clone()
        };
        node_config_store::no_op::insert(txn.conn(), &cloned).await?;
        txn.track(ChangeEvent::NodeNoOp {
            flow_id: copy.id,
            change: Change::insert(cloned.node_id, cloned),
        });
    }

    txn.commit_and_publish(&state.hub).await?;
    Ok(copy)
}

pub async fn run(state: &AppState, caller: &Caller, flow_id: Id) -> Result<RunOutcome, RpcError> {
    crate::run::flow_run(state, caller, flow_id).await
}

pub async fn stop(state: &AppState, caller: &Caller, flow_id: Id) -> Result<(), RpcError> {
    crate::run::flow_stop(state, caller, flow_id).await
}
