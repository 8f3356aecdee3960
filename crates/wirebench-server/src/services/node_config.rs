//! Sub-config CRUD for the six typed node families.
//!
//! Two rules differ from plain entity CRUD. An insert tolerates an
//! absent parent node (clients send graph pieces out of order): the
//! row is written but no event is published, and the client picks it
//! up when the node's own event triggers a re-fetch. A delete
//! tolerates an absent row but still publishes — a delete when the row
//! existed, an invalidation (update without an item) when it did not —
//! so subscribers always re-fetch.

use wirebench_engine::event::{Change, ChangeEvent};
use wirebench_engine::model::{
    CompressionKind, ErrorHandling, NoOpKind, NodeCondition, NodeFor, NodeForEach, NodeHttp,
    NodeJs, NodeNoOp,
};
use wirebench_engine::Id;

use wirebench_storage::stores::{node_config_store, node_store};
use wirebench_storage::ChangeTxn;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

use super::require_id;

#[derive(Debug, Clone, Default)]
pub struct NodeHttpPatch {
    pub node_id: Id,
    pub http_id: Option<Id>,
    pub delta_http_id: Option<Option<Id>>,
    pub has_request_config: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeConditionPatch {
    pub node_id: Id,
    pub expr: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeForPatch {
    pub node_id: Id,
    /// Present-and-zero is legal and must persist as zero.
    pub iter_count: Option<i64>,
    pub condition_expr: Option<Option<String>>,
    pub error_handling: Option<ErrorHandling>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeForEachPatch {
    pub node_id: Id,
    pub iter_expr: Option<String>,
    pub condition_expr: Option<Option<String>>,
    pub error_handling: Option<ErrorHandling>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeJsPatch {
    pub node_id: Id,
    pub code: Option<Vec<u8>>,
    pub compression_kind: Option<CompressionKind>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeNoOpPatch {
    pub node_id: Id,
    pub kind: Option<NoOpKind>,
}

macro_rules! config_family {
    ($mod_name:ident, $ty:ty, $store:ident, $variant:ident, { $($update_fn:item)* }) => {
        pub mod $mod_name {
            use super::*;

            pub async fn collection(
                state: &AppState,
                caller: &Caller,
                flow_id: Id,
            ) -> Result<Vec<$ty>, RpcError> {
                access::ensure_flow_access(&state.db, caller, flow_id).await?;
                Ok(node_config_store::$store::list_by_flow(&state.db, flow_id).await?)
            }

            pub async fn insert(
                state: &AppState,
                caller: &Caller,
                items: Vec<$ty>,
            ) -> Result<(), RpcError> {
                // Topic per item, None when the parent node has not
                // arrived yet.
                let mut topics = Vec::with_capacity(items.len());
                for item in &items {
                    require_id(item.node_id, "node")?;
                    match node_store::get(&state.db, item.node_id).await? {
                        Some(node) => {
                            access::ensure_flow_mutable(&state.db, caller, node.flow_id).await?;
                            topics.push(Some(node.flow_id));
                        }
                        None => topics.push(None),
                    }
                }

                let mut txn = ChangeTxn::begin(&state.db).await?;
                for (item, topic) in items.iter().zip(&topics) {
                    node_config_store::$store::insert(txn.conn(), item).await?;
                    if let Some(flow_id) = topic {
                        txn.track(ChangeEvent::$variant {
                            flow_id: *flow_id,
                            change: Change::insert(item.node_id, item.clone()),
                        });
                    }
                }
                txn.commit_and_publish(&state.hub).await?;
                Ok(())
            }

            pub async fn delete(
                state: &AppState,
                caller: &Caller,
                node_ids: Vec<Id>,
            ) -> Result<(), RpcError> {
                let mut targets = Vec::with_capacity(node_ids.len());
                for node_id in node_ids {
                    require_id(node_id, "node")?;
                    let node = access::ensure_node_mutable(&state.db, caller, node_id).await?;
                    let existed = node_config_store::$store::get(&state.db, node_id)
                        .await?
                        .is_some();
                    targets.push((node_id, node.flow_id, existed));
                }

                let mut txn = ChangeTxn::begin(&state.db).await?;
                for (node_id, flow_id, existed) in &targets {
                    node_config_store::$store::delete(txn.conn(), *node_id).await?;
                    let change = if *existed {
                        Change::delete(*node_id)
                    } else {
                        Change::invalidate(*node_id)
                    };
                    txn.track(ChangeEvent::$variant {
                        flow_id: *flow_id,
                        change,
                    });
                }
                txn.commit_and_publish(&state.hub).await?;
                Ok(())
            }

            $($update_fn)*
        }
    };
}

config_family!(http, NodeHttp, http, NodeHttp, {
    pub async fn update(
        state: &AppState,
        caller: &Caller,
        patches: Vec<NodeHttpPatch>,
    ) -> Result<(), RpcError> {
        let mut targets = Vec::with_capacity(patches.len());
        for patch in &patches {
            require_id(patch.node_id, "node")?;
            let node = access::ensure_node_mutable(&state.db, caller, patch.node_id).await?;
            let mut config = node_config_store::http::get(&state.db, patch.node_id)
                .await?
                .ok_or_else(|| RpcError::not_found("node http config not found"))?;
            if let Some(http_id) = patch.http_id {
                config.http_id = http_id;
            }
            if let Some(delta) = patch.delta_http_id {
                config.delta_http_id = delta;
            }
            if let Some(has_config) = patch.has_request_config {
                config.has_request_config = has_config;
            }
            targets.push((node.flow_id, config));
        }

        let mut txn = ChangeTxn::begin(&state.db).await?;
        for (flow_id, config) in &targets {
            node_config_store::http::update(txn.conn(), config).await?;
            txn.track(ChangeEvent::NodeHttp {
                flow_id: *flow_id,
                change: Change::update(config.node_id, config.clone()),
            });
        }
        txn.commit_and_publish(&state.hub).await?;
        Ok(())
    }
});

config_family!(condition, NodeCondition, condition, NodeCondition, {
    pub async fn update(
        state: &AppState,
        caller: &Caller,
        patches: Vec<NodeConditionPatch>,
    ) -> Result<(), RpcError> {
        let mut targets = Vec::with_capacity(patches.len());
        for patch in &patches {
            require_id(patch.node_id, "node")?;
            let node = access::ensure_node_mutable(&state.db, caller, patch.node_id).await?;
            let mut config = node_config_store::condition::get(&state.db, patch.node_id)
                .await?
                .ok_or_else(|| RpcError::not_found("node condition config not found"))?;
            if let Some(expr) = &patch.expr {
                config.expr = expr.clone();
            }
            targets.push((node.flow_id, config));
        }

        let mut txn = ChangeTxn::begin(&state.db).await?;
        for (flow_id, config) in &targets {
            node_config_store::condition::update(txn.conn(), config).await?;
            txn.track(ChangeEvent::NodeCondition {
                flow_id: *flow_id,
                change: Change::update(config.node_id, config.clone()),
            });
        }
        txn.commit_and_publish(&state.hub).await?;
        Ok(())
    }
});

config_family!(for_count, NodeFor, for_count, NodeFor, {
    pub async fn update(
        state: &AppState,
        caller: &Caller,
        patches: Vec<NodeForPatch>,
    ) -> Result<(), RpcError> {
        let mut targets = Vec::with_capacity(patches.len());
        for patch in &patches {
            require_id(patch.node_id, "node")?;
            let node = access::ensure_node_mutable(&state.db, caller, patch.node_id).await?;
            let mut config = node_config_store::for_count::get(&state.db, patch.node_id)
                .await?
                .ok_or_else(|| RpcError::not_found("node for config not found"))?;
            if let Some(iter_count) = patch.iter_count {
                config.iter_count = iter_count;
            }
            if let Some(condition_expr) = &patch.condition_expr {
                config.condition_expr = condition_expr.clone();
            }
            if let Some(error_handling) = patch.error_handling {
                config.error_handling = error_handling;
            }
            targets.push((node.flow_id, config));
        }

        let mut txn = ChangeTxn::begin(&state.db).await?;
        for (flow_id, config) in &targets {
            node_config_store::for_count::update(txn.conn(), config).await?;
            txn.track(ChangeEvent::NodeFor {
                flow_id: *flow_id,
                change: Change::update(config.node_id, config.clone()),
            });
        }
        txn.commit_and_publish(&state.hub).await?;
        Ok(())
    }
});

config_family!(for_each, NodeForEach, for_each, NodeForEach, {
    pub async fn update(
        state: &AppState,
        caller: &Caller,
        patches: Vec<NodeForEachPatch>,
    ) -> Result<(), RpcError> {
        let mut targets = Vec::with_capacity(patches.len());
        for patch in &patches {
            require_id(patch.node_id, "node")?;
            let node = access::ensure_node_mutable(&state.db, caller, patch.node_id).await?;
            let mut config = node_config_store::for_each::get(&state.db, patch.node_id)
                .await?
                .ok_or_else(|| RpcError::not_found("node for_each config not found"))?;
            if let Some(iter_expr) = &patch.iter_expr {
                config.iter_expr = iter_expr.clone();
            }
            if let Some(condition_expr) = &patch.condition_expr {
                config.condition_expr = condition_expr.clone();
            }
            if let Some(error_handling) = patch.error_handling {
                config.error_handling = error_handling;
            }
            targets.push((node.flow_id, config));
        }

        let mut txn = ChangeTxn::begin(&state.db).await?;
        for (flow_id, config) in &targets {
            node_config_store::for_each::update(txn.conn(), config).await?;
            txn.track(ChangeEvent::NodeForEach {
                flow_id: *flow_id,
                change: Change::update(config.node_id, config.clone()),
            });
        }
        txn.commit_and_publish(&state.hub).await?;
        Ok(())
    }
});

config_family!(js, NodeJs, js, NodeJs, {
    pub async fn update(
        state: &AppState,
        caller: &Caller,
        patches: Vec<NodeJsPatch>,
    ) -> Result<(), RpcError> {
        let mut targets = Vec::with_capacity(patches.len());
        for patch in &patches {
            require_id(patch.node_id, "node")?;
            let node = access::ensure_node_mutable(&state.db, caller, patch.node_id).await?;
            let mut config = node_config_store::js::get(&state.db, patch.node_id)
                .await?
                .ok_or_else(|| RpcError::not_found("node js config not found"))?;
            if let Some(code) = &patch.code {
                config.code = code.clone();
            }
            if let Some(compression_kind) = patch.compression_kind {
                config.compression_kind = compression_kind;
            }
            targets.push((node.flow_id, config));
        }

        let mut txn = ChangeTxn::begin(&state.db).await?;
        for (flow_id, config) in &targets {
            node_config_store::js::update(txn.conn(), config).await?;
            txn.track(ChangeEvent::NodeJs {
                flow_id: *flow_id,
                change: Change::update(config.node_id, config.clone()),
            });
        }
        txn.commit_and_publish(&state.hub).await?;
        Ok(())
    }
});

config_family!(no_op, NodeNoOp, no_op, NodeNoOp, {
    pub async fn update(
        state: &AppState,
        caller: &Caller,
        patches: Vec<NodeNoOpPatch>,
    ) -> Result<(), RpcError> {
        let mut targets = Vec::with_capacity(patches.len());
        for patch in &patches {
            require_id(patch.node_id, "node")?;
            let node = access::ensure_node_mutable(&state.db, caller, patch.node_id).await?;
            let mut config = node_config_store::no_op::get(&state.db, patch.node_id)
                .await?
                .ok_or_else(|| RpcError::not_found("node no_op config not found"))?;
            if let Some(kind) = patch.kind {
                config.kind = kind;
            }
            targets.push((node.flow_id, config));
        }

        let mut txn = ChangeTxn::begin(&state.db).await?;
        for (flow_id, config) in &targets {
            node_config_store::no_op::update(txn.conn(), config).await?;
            txn.track(ChangeEvent::NodeNoOp {
                flow_id: *flow_id,
                change: Change::update(config.node_id, config.clone()),
            });
        }
        txn.commit_and_publish(&state.hub).await?;
        Ok(())
    }
});
