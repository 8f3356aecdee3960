//! Sync streams: one snapshot plus a live tail per entity family.
//!
//! Opening a stream registers the topic filter and computes the
//! snapshot atomically (the streamer holds its registration gate
//! across the snapshot read), so the union of snapshot and tail is
//! exactly the items existing at subscription time plus everything
//! published after — no gaps, no duplicates. Snapshot items are
//! emitted as inserts in entity-id order; executions use upsert-style
//! updates because the client cannot tell insert from update there.
//! The tail is coalesced by the batching adapter.

use wirebench_engine::event::Change;
use wirebench_engine::model::{
    Edge, Flow, FlowVariable, HttpResponse, Node, NodeCondition, NodeExecution, NodeFor,
    NodeForEach, NodeHttp, NodeJs, NodeNoOp, ResponseAssert, ResponseHeader,
};
use wirebench_engine::stream::{Batched, Streamer};
use wirebench_engine::Id;

use wirebench_storage::stores::{
    edge_store, execution_store, flow_store, node_config_store, node_store, response_store,
    variable_store,
};
use wirebench_storage::StoreError;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

/// An open sync stream: the snapshot, then batches from the tail.
pub struct SyncStream<T> {
    snapshot: Vec<Change<T>>,
    tail: Batched<Id, Change<T>>,
}

impl<T> std::fmt::Debug for SyncStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStream").finish_non_exhaustive()
    }
}

impl<T> SyncStream<T> {
    /// The initial state dump. Call once, before tailing.
    pub fn take_snapshot(&mut self) -> Vec<Change<T>> {
        std::mem::take(&mut self.snapshot)
    }

    /// Next coalesced batch of live events, `None` once closed.
    pub async fn next_batch(&mut self) -> Option<Vec<Change<T>>> {
        self.tail
            .next()
            .await
            .map(|batch| batch.into_iter().map(|(_, change)| change).collect())
    }

    /// Events lost to this subscriber's bounded queue.
    pub fn dropped(&self) -> u64 {
        self.tail.dropped()
    }
}

async fn open<T, F, Fut>(
    streamer: &Streamer<Id, Change<T>>,
    topics: Vec<Id>,
    as_item: fn(Id, T) -> Change<T>,
    load: F,
) -> Result<SyncStream<T>, RpcError>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<(Id, T)>, StoreError>>,
{
    let (mut items, sub) = streamer
        .subscribe_with_snapshot(move |topic| topics.contains(topic), load)
        .await?;
    items.sort_by_key(|(id, _)| *id);
    let snapshot = items
        .into_iter()
        .map(|(id, item)| as_item(id, item))
        .collect();
    Ok(SyncStream {
        snapshot,
        tail: Batched::new(sub),
    })
}

// ---- Per-family streams ---------------------------------------------------

pub async fn flow_sync(state: &AppState, caller: &Caller) -> Result<SyncStream<Flow>, RpcError> {
    let topics = access::accessible_workspaces(&state.db, caller).await?;
    let db = state.db.clone();
    let workspaces = topics.clone();
    open(&state.hub.flows, topics, Change::insert, || async move {
        let flows = flow_store::list_by_workspaces(&db, &workspaces).await?;
        Ok(flows.into_iter().map(|f| (f.id, f)).collect())
    })
    .await
}

pub async fn node_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<Node>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(&state.hub.nodes, vec![flow_id], Change::insert, || async move {
        let nodes = node_store::list_by_flow(&db, flow_id).await?;
        Ok(nodes.into_iter().map(|n| (n.id, n)).collect())
    })
    .await
}

pub async fn edge_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<Edge>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(&state.hub.edges, vec![flow_id], Change::insert, || async move {
        let edges = edge_store::list_by_flow(&db, flow_id).await?;
        Ok(edges.into_iter().map(|e| (e.id, e)).collect())
    })
    .await
}

pub async fn variable_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<FlowVariable>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.variables,
        vec![flow_id],
        Change::insert,
        || async move {
            let variables = variable_store::list_by_flow(&db, flow_id).await?;
            Ok(variables.into_iter().map(|v| (v.id, v)).collect())
        },
    )
    .await
}

pub async fn node_http_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<NodeHttp>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.node_http,
        vec![flow_id],
        Change::insert,
        || async move {
            let configs = node_config_store::http::list_by_flow(&db, flow_id).await?;
            Ok(configs.into_iter().map(|c| (c.node_id, c)).collect())
        },
    )
    .await
}

pub async fn node_condition_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<NodeCondition>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.node_condition,
        vec![flow_id],
        Change::insert,
        || async move {
            let configs = node_config_store::condition::list_by_flow(&db, flow_id).await?;
            Ok(configs.into_iter().map(|c| (c.node_id, c)).collect())
        },
    )
    .await
}

pub async fn node_for_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<NodeFor>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.node_for,
        vec![flow_id],
        Change::insert,
        || async move {
            let configs = node_config_store::for_count::list_by_flow(&db, flow_id).await?;
            Ok(configs.into_iter().map(|c| (c.node_id, c)).collect())
        },
    )
    .await
}

pub async fn node_for_each_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<NodeForEach>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.node_for_each,
        vec![flow_id],
        Change::insert,
        || async move {
            let configs = node_config_store::for_each::list_by_flow(&db, flow_id).await?;
            Ok(configs.into_iter().map(|c| (c.node_id, c)).collect())
        },
    )
    .await
}

pub async fn node_js_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<NodeJs>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.node_js,
        vec![flow_id],
        Change::insert,
        || async move {
            let configs = node_config_store::js::list_by_flow(&db, flow_id).await?;
            Ok(configs.into_iter().map(|c| (c.node_id, c)).collect())
        },
    )
    .await
}

pub async fn node_no_op_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<NodeNoOp>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.node_no_op,
        vec![flow_id],
        Change::insert,
        || async move {
            let configs = node_config_store::no_op::list_by_flow(&db, flow_id).await?;
            Ok(configs.into_iter().map(|c| (c.node_id, c)).collect())
        },
    )
    .await
}

/// Execution sync uses upsert-style items: the snapshot and every live
/// event arrive as updates carrying the record.
pub async fn execution_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<NodeExecution>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.executions,
        vec![flow_id],
        Change::update,
        || async move {
            let executions = execution_store::list_by_flow(&db, flow_id).await?;
            Ok(executions.into_iter().map(|e| (e.id, e)).collect())
        },
    )
    .await
}

pub async fn response_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<HttpResponse>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.responses,
        vec![flow_id],
        Change::insert,
        || async move {
            let responses = response_store::list_by_flow(&db, flow_id).await?;
            Ok(responses.into_iter().map(|r| (r.id, r)).collect())
        },
    )
    .await
}

pub async fn response_header_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<ResponseHeader>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.response_headers,
        vec![flow_id],
        Change::insert,
        || async move {
            let responses = response_store::list_by_flow(&db, flow_id).await?;
            let mut items = Vec::new();
            for response in responses {
                for header in response_store::headers_by_response(&db, response.id).await? {
                    items.push((header.id, header));
                }
            }
            Ok(items)
        },
    )
    .await
}

pub async fn response_assert_sync(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<SyncStream<ResponseAssert>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let db = state.db.clone();
    open(
        &state.hub.response_asserts,
        vec![flow_id],
        Change::insert,
        || async move {
            let responses = response_store::list_by_flow(&db, flow_id).await?;
            let mut items = Vec::new();
            for response in responses {
                for assert in response_store::asserts_by_response(&db, response.id).await? {
                    items.push((assert.id, assert));
                }
            }
            Ok(items)
        },
    )
    .await
}
