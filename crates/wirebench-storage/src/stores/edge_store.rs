use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use wirebench_engine::model::{Edge, EdgeHandle, EdgeKind};
use wirebench_engine::Id;

use super::{id_bytes, read_id};
use crate::models::edge;
use crate::StoreError;

fn to_domain(model: edge::Model) -> Result<Edge, StoreError> {
    Ok(Edge {
        id: read_id(&model.id)?,
        flow_id: read_id(&model.flow_id)?,
        source_node_id: read_id(&model.source_node_id)?,
        target_node_id: read_id(&model.target_node_id)?,
        source_handle: EdgeHandle::from_i32(model.source_handle),
        kind: EdgeKind::from_i32(model.kind),
    })
}

fn to_active(item: &Edge) -> edge::ActiveModel {
    edge::ActiveModel {
        id: Set(id_bytes(item.id)),
        flow_id: Set(id_bytes(item.flow_id)),
        source_node_id: Set(id_bytes(item.source_node_id)),
        target_node_id: Set(id_bytes(item.target_node_id)),
        source_handle: Set(item.source_handle.as_i32()),
        kind: Set(item.kind.as_i32()),
    }
}

pub async fn insert<C: ConnectionTrait>(conn: &C, item: &Edge) -> Result<(), StoreError> {
    edge::Entity::insert(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn update<C: ConnectionTrait>(conn: &C, item: &Edge) -> Result<(), StoreError> {
    edge::Entity::update(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: Id) -> Result<Option<Edge>, StoreError> {
    edge::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(to_domain)
        .transpose()
}

pub async fn list_by_flow<C: ConnectionTrait>(conn: &C, flow_id: Id) -> Result<Vec<Edge>, StoreError> {
    let models = edge::Entity::find()
        .filter(edge::Column::FlowId.eq(id_bytes(flow_id)))
        .order_by_asc(edge::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(to_domain).collect()
}

pub async fn delete<C: ConnectionTrait>(conn: &C, id: Id) -> Result<(), StoreError> {
    edge::Entity::delete_by_id(id_bytes(id)).exec(conn).await?;
    Ok(())
}
