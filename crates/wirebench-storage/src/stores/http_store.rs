//! Shared HTTP definitions and their child records. `load_bundle`
//! assembles the full [`HttpBundle`] the resolver consumes.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use wirebench_engine::model::{
    BodyKind, FormField, HttpAssert, HttpBody, HttpDefinition, HttpHeader, HttpQuery,
    UrlEncodedField,
};
use wirebench_engine::resolver::HttpBundle;
use wirebench_engine::Id;

use super::{id_bytes, opt_id_bytes, read_id, read_opt_id};
use crate::models::{
    http_assert, http_definition, http_form_field, http_header, http_query, http_url_encoded_field,
};
use crate::StoreError;

// ---- Definitions ----------------------------------------------------------

fn definition_to_domain(model: http_definition::Model) -> Result<HttpDefinition, StoreError> {
    Ok(HttpDefinition {
        id: read_id(&model.id)?,
        workspace_id: read_id(&model.workspace_id)?,
        method: model.method,
        url: model.url,
        body_kind: BodyKind::from_i32(model.body_kind),
        body_raw: model.body_raw,
        parent_id: read_opt_id(&model.parent_id)?,
        method_override: model.method_override,
        url_override: model.url_override,
    })
}

fn definition_to_active(item: &HttpDefinition) -> http_definition::ActiveModel {
    http_definition::ActiveModel {
        id: Set(id_bytes(item.id)),
        workspace_id: Set(id_bytes(item.workspace_id)),
        method: Set(item.method.clone()),
        url: Set(item.url.clone()),
        body_kind: Set(item.body_kind.as_i32()),
        body_raw: Set(item.body_raw.clone()),
        parent_id: Set(opt_id_bytes(item.parent_id)),
        method_override: Set(item.method_override.clone()),
        url_override: Set(item.url_override.clone()),
    }
}

pub async fn insert_definition<C: ConnectionTrait>(
    conn: &C,
    item: &HttpDefinition,
) -> Result<(), StoreError> {
    http_definition::Entity::insert(definition_to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn update_definition<C: ConnectionTrait>(
    conn: &C,
    item: &HttpDefinition,
) -> Result<(), StoreError> {
    http_definition::Entity::update(definition_to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn get_definition<C: ConnectionTrait>(
    conn: &C,
    id: Id,
) -> Result<Option<HttpDefinition>, StoreError> {
    http_definition::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(definition_to_domain)
        .transpose()
}

pub async fn list_definitions_by_workspace<C: ConnectionTrait>(
    conn: &C,
    workspace_id: Id,
) -> Result<Vec<HttpDefinition>, StoreError> {
    let models = http_definition::Entity::find()
        .filter(http_definition::Column::WorkspaceId.eq(id_bytes(workspace_id)))
        .order_by_asc(http_definition::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(definition_to_domain).collect()
}

pub async fn count_definitions<C: ConnectionTrait>(conn: &C) -> Result<u64, StoreError> {
    Ok(http_definition::Entity::find().count(conn).await?)
}

/// Delete a definition and all of its child records.
pub async fn delete_definition_cascade<C: ConnectionTrait>(
    conn: &C,
    id: Id,
) -> Result<(), StoreError> {
    let key = id_bytes(id);
    http_header::Entity::delete_many()
        .filter(http_header::Column::HttpId.eq(key.clone()))
        .exec(conn)
        .await?;
    http_query::Entity::delete_many()
        .filter(http_query::Column::HttpId.eq(key.clone()))
        .exec(conn)
        .await?;
    http_form_field::Entity::delete_many()
        .filter(http_form_field::Column::HttpId.eq(key.clone()))
        .exec(conn)
        .await?;
    http_url_encoded_field::Entity::delete_many()
        .filter(http_url_encoded_field::Column::HttpId.eq(key.clone()))
        .exec(conn)
        .await?;
    http_assert::Entity::delete_many()
        .filter(http_assert::Column::HttpId.eq(key.clone()))
        .exec(conn)
        .await?;
    http_definition::Entity::delete_by_id(key).exec(conn).await?;
    Ok(())
}

// ---- Child records --------------------------------------------------------

fn header_to_domain(model: http_header::Model) -> Result<HttpHeader, StoreError> {
    Ok(HttpHeader {
        id: read_id(&model.id)?,
        http_id: read_id(&model.http_id)?,
        key: model.key,
        value: model.value,
        enabled: model.enabled,
        is_delta: model.is_delta,
        parent_id: read_opt_id(&model.parent_id)?,
        value_override: model.value_override,
    })
}

fn query_to_domain(model: http_query::Model) -> Result<HttpQuery, StoreError> {
    Ok(HttpQuery {
        id: read_id(&model.id)?,
        http_id: read_id(&model.http_id)?,
        key: model.key,
        value: model.value,
        enabled: model.enabled,
        is_delta: model.is_delta,
        parent_id: read_opt_id(&model.parent_id)?,
        value_override: model.value_override,
    })
}

fn form_to_domain(model: http_form_field::Model) -> Result<FormField, StoreError> {
    Ok(FormField {
        id: read_id(&model.id)?,
        http_id: read_id(&model.http_id)?,
        key: model.key,
        value: model.value,
        enabled: model.enabled,
        is_delta: model.is_delta,
        parent_id: read_opt_id(&model.parent_id)?,
        value_override: model.value_override,
    })
}

fn url_encoded_to_domain(
    model: http_url_encoded_field::Model,
) -> Result<UrlEncodedField, StoreError> {
    Ok(UrlEncodedField {
        id: read_id(&model.id)?,
        http_id: read_id(&model.http_id)?,
        key: model.key,
        value: model.value,
        enabled: model.enabled,
        is_delta: model.is_delta,
        parent_id: read_opt_id(&model.parent_id)?,
        value_override: model.value_override,
    })
}

fn assert_to_domain(model: http_assert::Model) -> Result<HttpAssert, StoreError> {
    Ok(HttpAssert {
        id: read_id(&model.id)?,
        http_id: read_id(&model.http_id)?,
        expr: model.expr,
        enabled: model.enabled,
        blocking: model.blocking,
    })
}

pub async fn insert_header<C: ConnectionTrait>(
    conn: &C,
    item: &HttpHeader,
) -> Result<(), StoreError> {
    http_header::Entity::insert(http_header::ActiveModel {
        id: Set(id_bytes(item.id)),
        http_id: Set(id_bytes(item.http_id)),
        key: Set(item.key.clone()),
        value: Set(item.value.clone()),
        enabled: Set(item.enabled),
        is_delta: Set(item.is_delta),
        parent_id: Set(opt_id_bytes(item.parent_id)),
        value_override: Set(item.value_override.clone()),
    })
    .exec(conn)
    .await?;
    Ok(())
}

pub async fn insert_query<C: ConnectionTrait>(
    conn: &C,
    item: &HttpQuery,
) -> Result<(), StoreError> {
    http_query::Entity::insert(http_query::ActiveModel {
        id: Set(id_bytes(item.id)),
        http_id: Set(id_bytes(item.http_id)),
        key: Set(item.key.clone()),
        value: Set(item.value.clone()),
        enabled: Set(item.enabled),
        is_delta: Set(item.is_delta),
        parent_id: Set(opt_id_bytes(item.parent_id)),
        value_override: Set(item.value_override.clone()),
    })
    .exec(conn)
    .await?;
    Ok(())
}

pub async fn insert_form_field<C: ConnectionTrait>(
    conn: &C,
    item: &FormField,
) -> Result<(), StoreError> {
    http_form_field::Entity::insert(http_form_field::ActiveModel {
        id: Set(id_bytes(item.id)),
        http_id: Set(id_bytes(item.http_id)),
        key: Set(item.key.clone()),
        value: Set(item.value.clone()),
        enabled: Set(item.enabled),
        is_delta: Set(item.is_delta),
        parent_id: Set(opt_id_bytes(item.parent_id)),
        value_override: Set(item.value_override.clone()),
    })
    .exec(conn)
    .await?;
    Ok(())
}

pub async fn insert_url_encoded_field<C: ConnectionTrait>(
    conn: &C,
    item: &UrlEncodedField,
) -> Result<(), StoreError> {
    http_url_encoded_field::Entity::insert(http_url_encoded_field::ActiveModel {
        id: Set(id_bytes(item.id)),
        http_id: Set(id_bytes(item.http_id)),
        key: Set(item.key.clone()),
        value: Set(item.value.clone()),
        enabled: Set(item.enabled),
        is_delta: Set(item.is_delta),
        parent_id: Set(opt_id_bytes(item.parent_id)),
        value_override: Set(item.value_override.clone()),
    })
    .exec(conn)
    .await?;
    Ok(())
}

pub async fn insert_assert<C: ConnectionTrait>(
    conn: &C,
    item: &HttpAssert,
) -> Result<(), StoreError> {
    http_assert::Entity::insert(http_assert::ActiveModel {
        id: Set(id_bytes(item.id)),
        http_id: Set(id_bytes(item.http_id)),
        expr: Set(item.expr.clone()),
        enabled: Set(item.enabled),
        blocking: Set(item.blocking),
    })
    .exec(conn)
    .await?;
    Ok(())
}

// ---- Bundle assembly ------------------------------------------------------

/// Load a definition with every child record, in insertion order.
/// Returns `None` when the definition does not exist.
pub async fn load_bundle<C: ConnectionTrait>(
    conn: &C,
    http_id: Id,
) -> Result<Option<HttpBundle>, StoreError> {
    let Some(definition) = get_definition(conn, http_id).await? else {
        return Ok(None);
    };
    let key = id_bytes(http_id);

    let headers = http_header::Entity::find()
        .filter(http_header::Column::HttpId.eq(key.clone()))
        .order_by_asc(http_header::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(header_to_domain)
        .collect::<Result<Vec<_>, _>>()?;
    let queries = http_query::Entity::find()
        .filter(http_query::Column::HttpId.eq(key.clone()))
        .order_by_asc(http_query::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(query_to_domain)
        .collect::<Result<Vec<_>, _>>()?;
    let form = http_form_field::Entity::find()
        .filter(http_form_field::Column::HttpId.eq(key.clone()))
        .order_by_asc(http_form_field::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(form_to_domain)
        .collect::<Result<Vec<_>, _>>()?;
    let url_encoded = http_url_encoded_field::Entity::find()
        .filter(http_url_encoded_field::Column::HttpId.eq(key.clone()))
        .order_by_asc(http_url_encoded_field::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(url_encoded_to_domain)
        .collect::<Result<Vec<_>, _>>()?;
    let asserts = http_assert::Entity::find()
        .filter(http_assert::Column::HttpId.eq(key))
        .order_by_asc(http_assert::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(assert_to_domain)
        .collect::<Result<Vec<_>, _>>()?;

    let body = HttpBody {
        raw: definition.body_raw.clone(),
        form,
        url_encoded,
    };
    Ok(Some(HttpBundle {
        definition,
        headers,
        queries,
        body,
        asserts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;

    fn definition(workspace_id: Id) -> HttpDefinition {
        HttpDefinition {
            id: Id::generate(),
            workspace_id,
            method: "GET".into(),
            url: "https://api.example.com/items".into(),
            body_kind: BodyKind::None,
            body_raw: None,
            parent_id: None,
            method_override: None,
            url_override: None,
        }
    }

    #[tokio::test]
    async fn load_bundle_collects_children() {
        let db = test_db().await;
        let def = definition(Id::generate());
        insert_definition(&db, &def).await.unwrap();
        insert_header(
            &db,
            &HttpHeader {
                id: Id::generate(),
                http_id: def.id,
                key: "Accept".into(),
                value: "application/json".into(),
                enabled: true,
                is_delta: false,
                parent_id: None,
                value_override: None,
            },
        )
        .await
        .unwrap();
        insert_assert(
            &db,
            &HttpAssert {
                id: Id::generate(),
                http_id: def.id,
                expr: "response.status == 200".into(),
                enabled: true,
                blocking: true,
            },
        )
        .await
        .unwrap();

        let bundle = load_bundle(&db, def.id).await.unwrap().unwrap();
        assert_eq!(bundle.headers.len(), 1);
        assert_eq!(bundle.asserts.len(), 1);
        assert!(bundle.queries.is_empty());
    }

    #[tokio::test]
    async fn load_bundle_of_missing_definition_is_none() {
        let db = test_db().await;
        assert!(load_bundle(&db, Id::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_cascade_removes_children() {
        let db = test_db().await;
        let def = definition(Id::generate());
        insert_definition(&db, &def).await.unwrap();
        insert_query(
            &db,
            &HttpQuery {
                id: Id::generate(),
                http_id: def.id,
                key: "page".into(),
                value: "1".into(),
                enabled: true,
                is_delta: false,
                parent_id: None,
                value_override: None,
            },
        )
        .await
        .unwrap();

        delete_definition_cascade(&db, def.id).await.unwrap();
        assert!(get_definition(&db, def.id).await.unwrap().is_none());
        assert_eq!(count_definitions(&db).await.unwrap(), 0);
    }
}
