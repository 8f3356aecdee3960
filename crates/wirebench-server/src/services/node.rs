//! Node CRUD. Deleting a node deletes its sub-config as a unit.

use wirebench_engine::event::{Change, ChangeEvent};
use wirebench_engine::model::{Node, NodeState};
use wirebench_engine::Id;

use wirebench_storage::stores::node_store;
use wirebench_storage::ChangeTxn;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

use super::require_id;

#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub id: Id,
    pub name: Option<String>,
    pub pos_x: Option<f64>,
    pub pos_y: Option<f64>,
    pub state: Option<NodeState>,
}

pub async fn collection(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<Vec<Node>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    Ok(node_store::list_by_flow(&state.db, flow_id).await?)
}

pub async fn insert(state: &AppState, caller: &Caller, items: Vec<Node>) -> Result<(), RpcError> {
    for item in &items {
        require_id(item.id, "node")?;
        require_id(item.flow_id, "flow")?;
        access::ensure_flow_mutable(&state.db, caller, item.flow_id).await?;
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for item in &items {
        node_store::insert(txn.conn(), item).await?;
        txn.track(ChangeEvent::Node {
            flow_id: item.flow_id,
            change: Change::insert(item.id, item.clone()),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}

pub async fn update(
    state: &AppState,
    caller: &Caller,
    patches: Vec<NodePatch>,
) -> Result<(), RpcError> {
    let mut targets = Vec::with_capacity(patches.len());
    for patch in &patches {
        require_id(patch.id, "node")?;
        let mut node = access::ensure_node_mutable(&state.db, caller, patch.id).await?;
        if let Some(name) = &patch.name {
            node.name = name.clone();
        }
        if let Some(pos_x) = patch.pos_x {
            node.pos_x = pos_x;
        }
        if let Some(pos_y) = patch.pos_y {
            node.pos_y = pos_y;
        }
        if let Some(state) = patch.state {
            node.state = state;
        }
        targets.push(node);
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for node in &targets {
        node_store::update(txn.conn(), node).await?;
        txn.track(ChangeEvent::Node {
            flow_id: node.flow_id,
            change: Change::update(node.id, node.clone()),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}

pub async fn delete(state: &AppState, caller: &Caller, ids: Vec<Id>) -> Result<(), RpcError> {
    let mut targets = Vec::with_capacity(ids.len());
    for id in ids {
        require_id(id, "node")?;
        targets.push(access::ensure_node_mutable(&state.db, caller, id).await?);
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for node in &targets {
        node_store::delete_cascade(txn.conn(), node.id).await?;
        txn.track(ChangeEvent::Node {
            flow_id: node.flow_id,
            change: Change::delete(node.id),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}
