//! Execution records are read-only over RPC: only the runner writes
//! them. The surface is a collection read plus the sync stream.

use wirebench_engine::model::NodeExecution;
use wirebench_engine::Id;

use wirebench_storage::stores::execution_store;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

pub async fn collection(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
    node_id: Option<Id>,
) -> Result<Vec<NodeExecution>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let mut executions = execution_store::list_by_flow(&state.db, flow_id).await?;
    if let Some(node_id) = node_id {
        executions.retain(|e| e.node_id == node_id);
    }
    Ok(executions)
}
