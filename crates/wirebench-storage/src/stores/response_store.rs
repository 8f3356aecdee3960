//! Persisted response artifacts. A response row, its headers, and its
//! assert results are written together so sync subscribers never see a
//! response without its children.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use wirebench_engine::model::{AssertResult, HttpResponse, ResponseAssert, ResponseHeader};
use wirebench_engine::Id;

use super::{id_bytes, read_id};
use crate::models::{http_response, http_response_assert, http_response_header};
use crate::StoreError;

fn response_to_domain(model: http_response::Model) -> Result<HttpResponse, StoreError> {
    Ok(HttpResponse {
        id: read_id(&model.id)?,
        request_node_id: read_id(&model.request_node_id)?,
        status: model.status as u16,
        body: model.body,
        duration_ms: model.duration_ms,
    })
}

fn header_to_domain(model: http_response_header::Model) -> Result<ResponseHeader, StoreError> {
    Ok(ResponseHeader {
        id: read_id(&model.id)?,
        response_id: read_id(&model.response_id)?,
        key: model.key,
        value: model.value,
    })
}

fn assert_to_domain(model: http_response_assert::Model) -> Result<ResponseAssert, StoreError> {
    Ok(ResponseAssert {
        id: read_id(&model.id)?,
        response_id: read_id(&model.response_id)?,
        expr: model.expr,
        result: AssertResult::from_i32(model.result),
    })
}

pub async fn insert_response<C: ConnectionTrait>(
    conn: &C,
    flow_id: Id,
    response: &HttpResponse,
    headers: &[ResponseHeader],
    asserts: &[ResponseAssert],
) -> Result<(), StoreError> {
    http_response::Entity::insert(http_response::ActiveModel {
        id: Set(id_bytes(response.id)),
        flow_id: Set(id_bytes(flow_id)),
        request_node_id: Set(id_bytes(response.request_node_id)),
        status: Set(i32::from(response.status)),
        body: Set(response.body.clone()),
        duration_ms: Set(response.duration_ms),
    })
    .exec(conn)
    .await?;

    // insert_many on an empty set is a DbErr, so guard both batches.
    if !headers.is_empty() {
        let rows = headers.iter().map(|h| http_response_header::ActiveModel {
            id: Set(id_bytes(h.id)),
            response_id: Set(id_bytes(h.response_id)),
            key: Set(h.key.clone()),
            value: Set(h.value.clone()),
        });
        http_response_header::Entity::insert_many(rows).exec(conn).await?;
    }
    if !asserts.is_empty() {
        let rows = asserts.iter().map(|a| http_response_assert::ActiveModel {
            id: Set(id_bytes(a.id)),
            response_id: Set(id_bytes(a.response_id)),
            expr: Set(a.expr.clone()),
            result: Set(a.result.as_i32()),
        });
        http_response_assert::Entity::insert_many(rows).exec(conn).await?;
    }
    Ok(())
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: Id) -> Result<Option<HttpResponse>, StoreError> {
    http_response::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(response_to_domain)
        .transpose()
}

pub async fn list_by_flow<C: ConnectionTrait>(
    conn: &C,
    flow_id: Id,
) -> Result<Vec<HttpResponse>, StoreError> {
    let models = http_response::Entity::find()
        .filter(http_response::Column::FlowId.eq(id_bytes(flow_id)))
        .order_by_asc(http_response::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(response_to_domain).collect()
}

pub async fn headers_by_response<C: ConnectionTrait>(
    conn: &C,
    response_id: Id,
) -> Result<Vec<ResponseHeader>, StoreError> {
    let models = http_response_header::Entity::find()
        .filter(http_response_header::Column::ResponseId.eq(id_bytes(response_id)))
        .order_by_asc(http_response_header::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(header_to_domain).collect()
}

pub async fn asserts_by_response<C: ConnectionTrait>(
    conn: &C,
    response_id: Id,
) -> Result<Vec<ResponseAssert>, StoreError> {
    let models = http_response_assert::Entity::find()
        .filter(http_response_assert::Column::ResponseId.eq(id_bytes(response_id)))
        .order_by_asc(http_response_assert::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(assert_to_domain).collect()
}
