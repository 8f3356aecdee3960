use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use wirebench_engine::model::FlowVariable;
use wirebench_engine::Id;

use super::{id_bytes, read_id};
use crate::models::flow_variable;
use crate::StoreError;

fn to_domain(model: flow_variable::Model) -> Result<FlowVariable, StoreError> {
    Ok(FlowVariable {
        id: read_id(&model.id)?,
        flow_id: read_id(&model.flow_id)?,
        name: model.name,
        value: model.value,
        enabled: model.enabled,
        description: model.description,
        order: model.sort_order,
    })
}

fn to_active(item: &FlowVariable) -> flow_variable::ActiveModel {
    flow_variable::ActiveModel {
        id: Set(id_bytes(item.id)),
        flow_id: Set(id_bytes(item.flow_id)),
        name: Set(item.name.clone()),
        value: Set(item.value.clone()),
        enabled: Set(item.enabled),
        description: Set(item.description.clone()),
        sort_order: Set(item.order),
    }
}

pub async fn insert<C: ConnectionTrait>(conn: &C, item: &FlowVariable) -> Result<(), StoreError> {
    flow_variable::Entity::insert(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn update<C: ConnectionTrait>(conn: &C, item: &FlowVariable) -> Result<(), StoreError> {
    flow_variable::Entity::update(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn get<C: ConnectionTrait>(
    conn: &C,
    id: Id,
) -> Result<Option<FlowVariable>, StoreError> {
    flow_variable::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(to_domain)
        .transpose()
}

pub async fn list_by_flow<C: ConnectionTrait>(
    conn: &C,
    flow_id: Id,
) -> Result<Vec<FlowVariable>, StoreError> {
    let models = flow_variable::Entity::find()
        .filter(flow_variable::Column::FlowId.eq(id_bytes(flow_id)))
        .order_by_asc(flow_variable::Column::SortOrder)
        .all(conn)
        .await?;
    models.into_iter().map(to_domain).collect()
}

pub async fn delete<C: ConnectionTrait>(conn: &C, id: Id) -> Result<(), StoreError> {
    flow_variable::Entity::delete_by_id(id_bytes(id)).exec(conn).await?;
    Ok(())
}
