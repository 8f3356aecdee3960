//! Node execution records. The runner upserts the same id for the
//! running and terminal events of one invocation, so writes go through
//! an insert with on-conflict update.

use sea_orm::sea_query::OnConflict;
use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use wirebench_engine::model::{ExecutionState, NodeExecution};
use wirebench_engine::Id;

use super::{id_bytes, opt_id_bytes, read_id, read_opt_id};
use crate::models::node_execution;
use crate::StoreError;

fn to_domain(model: node_execution::Model) -> Result<NodeExecution, StoreError> {
    Ok(NodeExecution {
        id: read_id(&model.id)?,
        node_id: read_id(&model.node_id)?,
        name: model.name,
        state: ExecutionState::from_i32(model.state),
        started_at: model.started_at.and_utc(),
        completed_at: model.completed_at.map(|t| t.and_utc()),
        error: model.error,
        input: model.input,
        output: model.output,
        response_id: read_opt_id(&model.response_id)?,
    })
}

fn to_active(flow_id: Id, item: &NodeExecution) -> node_execution::ActiveModel {
    node_execution::ActiveModel {
        id: Set(id_bytes(item.id)),
        flow_id: Set(id_bytes(flow_id)),
        node_id: Set(id_bytes(item.node_id)),
        name: Set(item.name.clone()),
        state: Set(item.state.as_i32()),
        started_at: Set(item.started_at.naive_utc()),
        completed_at: Set(item.completed_at.map(|t| t.naive_utc())),
        error: Set(item.error.clone()),
        input: Set(item.input.clone()),
        output: Set(item.output.clone()),
        response_id: Set(opt_id_bytes(item.response_id)),
    }
}

pub async fn upsert<C: ConnectionTrait>(
    conn: &C,
    flow_id: Id,
    item: &NodeExecution,
) -> Result<(), StoreError> {
    node_execution::Entity::insert(to_active(flow_id, item))
        .on_conflict(
            OnConflict::column(node_execution::Column::Id)
                .update_columns([
                    node_execution::Column::FlowId,
                    node_execution::Column::NodeId,
                    node_execution::Column::Name,
                    node_execution::Column::State,
                    node_execution::Column::StartedAt,
                    node_execution::Column::CompletedAt,
                    node_execution::Column::Error,
                    node_execution::Column::Input,
                    node_execution::Column::Output,
                    node_execution::Column::ResponseId,
                ])
                .to_owned(),
        )
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn get<C: ConnectionTrait>(
    conn: &C,
    id: Id,
) -> Result<Option<NodeExecution>, StoreError> {
    node_execution::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(to_domain)
        .transpose()
}

pub async fn list_by_flow<C: ConnectionTrait>(
    conn: &C,
    flow_id: Id,
) -> Result<Vec<NodeExecution>, StoreError> {
    let models = node_execution::Entity::find()
        .filter(node_execution::Column::FlowId.eq(id_bytes(flow_id)))
        .order_by_asc(node_execution::Column::StartedAt)
        .order_by_asc(node_execution::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(to_domain).collect()
}
