//! Edge CRUD. An edge's endpoints must be nodes of its own flow.

use wirebench_engine::event::{Change, ChangeEvent};
use wirebench_engine::model::{Edge, EdgeHandle, EdgeKind};
use wirebench_engine::Id;

use wirebench_storage::stores::{edge_store, node_store};
use wirebench_storage::ChangeTxn;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

use super::require_id;

#[derive(Debug, Clone, Default)]
pub struct EdgePatch {
    pub id: Id,
    pub source_node_id: Option<Id>,
    pub target_node_id: Option<Id>,
    pub source_handle: Option<EdgeHandle>,
    pub kind: Option<EdgeKind>,
}

async fn ensure_endpoint(state: &AppState, flow_id: Id, node_id: Id) -> Result<(), RpcError> {
    let node = node_store::get(&state.db, node_id)
        .await?
        .ok_or_else(|| RpcError::invalid_argument("edge references a missing node"))?;
    if node.flow_id != flow_id {
        return Err(RpcError::invalid_argument(
            "edge endpoints must belong to the edge's flow",
        ));
    }
    Ok(())
}

pub async fn collection(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<Vec<Edge>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    Ok(edge_store::list_by_flow(&state.db, flow_id).await?)
}

pub async fn insert(state: &AppState, caller: &Caller, items: Vec<Edge>) -> Result<(), RpcError> {
    for item in &items {
        require_id(item.id, "edge")?;
        require_id(item.flow_id, "flow")?;
        access::ensure_flow_mutable(&state.db, caller, item.flow_id).await?;
        ensure_endpoint(state, item.flow_id, item.source_node_id).await?;
        ensure_endpoint(state, item.flow_id, item.target_node_id).await?;
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for item in &items {
        edge_store::insert(txn.conn(), item).await?;
        txn.track(ChangeEvent::Edge {
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
    patches: Vec<EdgePatch>,
) -> Result<(), RpcError> {
    let mut targets = Vec::with_capacity(patches.len());
    for patch in &patches {
        require_id(patch.id, "edge")?;
        let mut edge = edge_store::get(&state.db, patch.id)
            .await?
            .ok_or_else(|| RpcError::not_found("edge not found"))?;
        access::ensure_flow_mutable(&state.db, caller, edge.flow_id)
            .await
            .map_err(|err| access::mask_not_found(err, "edge not found"))?;
        if let Some(source) = patch.source_node_id {
            ensure_endpoint(state, edge.flow_id, source).await?;
            edge.source_node_id = source;
        }
        if let Some(target) = patch.target_node_id {
            ensure_endpoint(state, edge.flow_id, target).await?;
            edge.target_node_id = target;
        }
        if let Some(handle) = patch.source_handle {
            edge.source_handle = handle;
        }
        if let Some(kind) = patch.kind {
            edge.kind = kind;
        }
        targets.push(edge);
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for edge in &targets {
        edge_store::update(txn.conn(), edge).await?;
        txn.track(ChangeEvent::Edge {
            flow_id: edge.flow_id,
            change: Change::update(edge.id, edge.clone()),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}

pub async fn delete(state: &AppState, caller: &Caller, ids: Vec<Id>) -> Result<(), RpcError> {
    let mut targets = Vec::with_capacity(ids.len());
    for id in ids {
        require_id(id, "edge")?;
        let edge = edge_store::get(&state.db, id)
            .await?
            .ok_or_else(|| RpcError::not_found("edge not found"))?;
        access::ensure_flow_mutable(&state.db, caller, edge.flow_id)
            .await
            .map_err(|err| access::mask_not_found(err, "edge not found"))?;
        targets.push(edge);
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for edge in &targets {
        edge_store::delete(txn.conn(), edge.id).await?;
        txn.track(ChangeEvent::Edge {
            flow_id: edge.flow_id,
            change: Change::delete(edge.id),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}
