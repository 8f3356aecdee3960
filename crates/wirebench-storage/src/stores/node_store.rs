use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use wirebench_engine::model::{Node, NodeKind, NodeState};
use wirebench_engine::Id;

use super::{id_bytes, read_id};
use crate::models::{
    node, node_condition, node_for, node_for_each, node_http, node_js, node_no_op,
};
use crate::StoreError;

fn to_domain(model: node::Model) -> Result<Node, StoreError> {
    Ok(Node {
        id: read_id(&model.id)?,
        flow_id: read_id(&model.flow_id)?,
        name: model.name,
        kind: NodeKind::from_i32(model.kind),
        pos_x: model.pos_x,
        pos_y: model.pos_y,
        state: NodeState::from_i32(model.state),
    })
}

fn to_active(item: &Node) -> node::ActiveModel {
    node::ActiveModel {
        id: Set(id_bytes(item.id)),
        flow_id: Set(id_bytes(item.flow_id)),
        name: Set(item.name.clone()),
        kind: Set(item.kind.as_i32()),
        pos_x: Set(item.pos_x),
        pos_y: Set(item.pos_y),
        state: Set(item.state.as_i32()),
    }
}

pub async fn insert<C: ConnectionTrait>(conn: &C, item: &Node) -> Result<(), StoreError> {
    node::Entity::insert(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn update<C: ConnectionTrait>(conn: &C, item: &Node) -> Result<(), StoreError> {
    node::Entity::update(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: Id) -> Result<Option<Node>, StoreError> {
    node::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(to_domain)
        .transpose()
}

pub async fn list_by_flow<C: ConnectionTrait>(conn: &C, flow_id: Id) -> Result<Vec<Node>, StoreError> {
    let models = node::Entity::find()
        .filter(node::Column::FlowId.eq(id_bytes(flow_id)))
        .order_by_asc(node::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(to_domain).collect()
}

/// Delete a node and its sub-config, whichever table holds it.
pub async fn delete_cascade<C: ConnectionTrait>(conn: &C, id: Id) -> Result<(), StoreError> {
    let key = id_bytes(id);
    node_http::Entity::delete_by_id(key.clone()).exec(conn).await?;
    node_condition::Entity::delete_by_id(key.clone()).exec(conn).await?;
    node_for::Entity::delete_by_id(key.clone()).exec(conn).await?;
    node_for_each::Entity::delete_by_id(key.clone()).exec(conn).await?;
    node_js::Entity::delete_by_id(key.clone()).exec(conn).await?;
    node_no_op::Entity::delete_by_id(key.clone()).exec(conn).await?;
    node::Entity::delete_by_id(key).exec(conn).await?;
    Ok(())
}
