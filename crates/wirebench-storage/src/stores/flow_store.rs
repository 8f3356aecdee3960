use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use wirebench_engine::model::Flow;
use wirebench_engine::Id;

use super::{id_bytes, id_bytes_list, opt_id_bytes, read_id, read_opt_id};
use crate::models::{
    edge, flow, flow_variable, http_response, http_response_assert, http_response_header, node,
    node_condition, node_execution, node_for, node_for_each, node_http, node_js, node_no_op,
};
use crate::StoreError;

fn to_domain(model: flow::Model) -> Result<Flow, StoreError> {
    Ok(Flow {
        id: read_id(&model.id)?,
        workspace_id: read_id(&model.workspace_id)?,
        name: model.name,
        running: model.running,
        duration_ms: model.duration_ms,
        version_parent_id: read_opt_id(&model.version_parent_id)?,
    })
}

fn to_active(item: &Flow) -> flow::ActiveModel {
    flow::ActiveModel {
        id: Set(id_bytes(item.id)),
        workspace_id: Set(id_bytes(item.workspace_id)),
        name: Set(item.name.clone()),
        running: Set(item.running),
        duration_ms: Set(item.duration_ms),
        version_parent_id: Set(opt_id_bytes(item.version_parent_id)),
    }
}

pub async fn insert<C: ConnectionTrait>(conn: &C, item: &Flow) -> Result<(), StoreError> {
    flow::Entity::insert(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn update<C: ConnectionTrait>(conn: &C, item: &Flow) -> Result<(), StoreError> {
    flow::Entity::update(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: Id) -> Result<Option<Flow>, StoreError> {
    flow::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(to_domain)
        .transpose()
}

pub async fn list_by_workspaces<C: ConnectionTrait>(
    conn: &C,
    workspace_ids: &[Id],
) -> Result<Vec<Flow>, StoreError> {
    let models = flow::Entity::find()
        .filter(flow::Column::WorkspaceId.is_in(id_bytes_list(workspace_ids)))
        .order_by_asc(flow::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(to_domain).collect()
}

/// Flip the running flag; the duration is written only when provided
/// so a start does not clear the previous run's timing.
pub async fn set_running<C: ConnectionTrait>(
    conn: &C,
    id: Id,
    running: bool,
    duration_ms: Option<i64>,
) -> Result<(), StoreError> {
    use sea_orm::sea_query::Expr;

    let mut update = flow::Entity::update_many()
        .col_expr(flow::Column::Running, Expr::value(running))
        .filter(flow::Column::Id.eq(id_bytes(id)));
    if let Some(duration_ms) = duration_ms {
        update = update.col_expr(flow::Column::DurationMs, Expr::value(duration_ms));
    }
    update.exec(conn).await?;
    Ok(())
}

/// Delete a flow and everything it contains. `node_ids` is the flow's
/// node set, fetched by the caller before the write transaction.
pub async fn delete_cascade<C: ConnectionTrait>(
    conn: &C,
    id: Id,
    node_ids: &[Id],
) -> Result<(), StoreError> {
    let node_keys = id_bytes_list(node_ids);
    if !node_keys.is_empty() {
        node_http::Entity::delete_many()
            .filter(node_http::Column::NodeId.is_in(node_keys.clone()))
            .exec(conn)
            .await?;
        node_condition::Entity::delete_many()
            .filter(node_condition::Column::NodeId.is_in(node_keys.clone()))
            .exec(conn)
            .await?;
        node_for::Entity::delete_many()
            .filter(node_for::Column::NodeId.is_in(node_keys.clone()))
            .exec(conn)
            .await?;
        node_for_each::Entity::delete_many()
            .filter(node_for_each::Column::NodeId.is_in(node_keys.clone()))
            .exec(conn)
            .await?;
        node_js::Entity::delete_many()
            .filter(node_js::Column::NodeId.is_in(node_keys.clone()))
            .exec(conn)
            .await?;
        node_no_op::Entity::delete_many()
            .filter(node_no_op::Column::NodeId.is_in(node_keys))
            .exec(conn)
            .await?;
    }

    let key = id_bytes(id);
    node::Entity::delete_many()
        .filter(node::Column::FlowId.eq(key.clone()))
        .exec(conn)
        .await?;
    edge::Entity::delete_many()
        .filter(edge::Column::FlowId.eq(key.clone()))
        .exec(conn)
        .await?;
    flow_variable::Entity::delete_many()
        .filter(flow_variable::Column::FlowId.eq(key.clone()))
        .exec(conn)
        .await?;
    node_execution::Entity::delete_many()
        .filter(node_execution::Column::FlowId.eq(key.clone()))
        .exec(conn)
        .await?;
    // Response children carry no flow_id, so they go by subquery over
    // the flow's responses, before the responses themselves.
    let flow_responses = || {
        sea_orm::sea_query::Query::select()
            .column(http_response::Column::Id)
            .from(http_response::Entity)
            .and_where(http_response::Column::FlowId.eq(key.clone()))
            .to_owned()
    };
    http_response_header::Entity::delete_many()
        .filter(http_response_header::Column::ResponseId.in_subquery(flow_responses()))
        .exec(conn)
        .await?;
    http_response_assert::Entity::delete_many()
        .filter(http_response_assert::Column::ResponseId.in_subquery(flow_responses()))
        .exec(conn)
        .await?;
    http_response::Entity::delete_many()
        .filter(http_response::Column::FlowId.eq(key.clone()))
        .exec(conn)
        .await?;
    flow::Entity::delete_by_id(key).exec(conn).await?;
    Ok(())
}
