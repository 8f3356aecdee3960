//! Flow variable CRUD.

use wirebench_engine::event::{Change, ChangeEvent};
use wirebench_engine::model::FlowVariable;
use wirebench_engine::Id;

use wirebench_storage::stores::variable_store;
use wirebench_storage::ChangeTxn;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

use super::require_id;

#[derive(Debug, Clone, Default)]
pub struct VariablePatch {
    pub id: Id,
    pub name: Option<String>,
    pub value: Option<String>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub order: Option<f64>,
}

pub async fn collection(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<Vec<FlowVariable>, RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    Ok(variable_store::list_by_flow(&state.db, flow_id).await?)
}

pub async fn insert(
    state: &AppState,
    caller: &Caller,
    items: Vec<FlowVariable>,
) -> Result<(), RpcError> {
    for item in &items {
        require_id(item.id, "variable")?;
        require_id(item.flow_id, "flow")?;
        access::ensure_flow_mutable(&state.db, caller, item.flow_id).await?;
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for item in &items {
        variable_store::insert(txn.conn(), item).await?;
        txn.track(ChangeEvent::Variable {
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
    patches: Vec<VariablePatch>,
) -> Result<(), RpcError> {
    let mut targets = Vec::with_capacity(patches.len());
    for patch in &patches {
        require_id(patch.id, "variable")?;
        let mut variable = variable_store::get(&state.db, patch.id)
            .await?
            .ok_or_else(|| RpcError::not_found("variable not found"))?;
        access::ensure_flow_mutable(&state.db, caller, variable.flow_id)
            .await
            .map_err(|err| access::mask_not_found(err, "variable not found"))?;
        if let Some(name) = &patch.name {
            variable.name = name.clone();
        }
        if let Some(value) = &patch.value {
            variable.value = value.clone();
        }
        if let Some(enabled) = patch.enabled {
            variable.enabled = enabled;
        }
        if let Some(description) = &patch.description {
            variable.description = description.clone();
        }
        if let Some(order) = patch.order {
            variable.order = order;
        }
        targets.push(variable);
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for variable in &targets {
        variable_store::update(txn.conn(), variable).await?;
        txn.track(ChangeEvent::Variable {
            flow_id: variable.flow_id,
            change: Change::update(variable.id, variable.clone()),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}

pub async fn delete(state: &AppState, caller: &Caller, ids: Vec<Id>) -> Result<(), RpcError> {
    let mut targets = Vec::with_capacity(ids.len());
    for id in ids {
        require_id(id, "variable")?;
        let variable = variable_store::get(&state.db, id)
            .await?
            .ok_or_else(|| RpcError::not_found("variable not found"))?;
        access::ensure_flow_mutable(&state.db, caller, variable.flow_id)
            .await
            .map_err(|err| access::mask_not_found(err, "variable not found"))?;
        targets.push(variable);
    }

    let mut txn = ChangeTxn::begin(&state.db).await?;
    for variable in &targets {
        variable_store::delete(txn.conn(), variable.id).await?;
        txn.track(ChangeEvent::Variable {
            flow_id: variable.flow_id,
            change: Change::delete(variable.id),
        });
    }
    txn.commit_and_publish(&state.hub).await?;
    Ok(())
}
