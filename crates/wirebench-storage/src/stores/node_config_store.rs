//! Stores for the six per-kind sub-config tables, all keyed by node
//! id. Deletes are tolerant: removing an absent row succeeds, the
//! caller still publishes an invalidation so subscribers re-fetch.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use wirebench_engine::model::{
    CompressionKind, ErrorHandling, NoOpKind, NodeCondition, NodeFor, NodeForEach, NodeHttp,
    NodeJs, NodeNoOp,
};
use wirebench_engine::Id;

use super::{id_bytes, opt_id_bytes, read_id, read_opt_id};
use crate::models::{
    node, node_condition, node_for, node_for_each, node_http, node_js, node_no_op,
};
use crate::StoreError;

async fn node_keys_of_flow<C: ConnectionTrait>(
    conn: &C,
    flow_id: Id,
) -> Result<Vec<Vec<u8>>, StoreError> {
    let nodes = node::Entity::find()
        .filter(node::Column::FlowId.eq(id_bytes(flow_id)))
        .all(conn)
        .await?;
    Ok(nodes.into_iter().map(|n| n.id).collect())
}

// ---- node_http ------------------------------------------------------------

pub mod http {
    use super::*;

    fn to_domain(model: node_http::Model) -> Result<NodeHttp, StoreError> {
        Ok(NodeHttp {
            node_id: read_id(&model.node_id)?,
            http_id: read_id(&model.http_id)?,
            delta_http_id: read_opt_id(&model.delta_http_id)?,
            has_request_config: model.has_request_config,
        })
    }

    fn to_active(item: &NodeHttp) -> node_http::ActiveModel {
        node_http::ActiveModel {
            node_id: Set(id_bytes(item.node_id)),
            http_id: Set(id_bytes(item.http_id)),
            delta_http_id: Set(opt_id_bytes(item.delta_http_id)),
            has_request_config: Set(item.has_request_config),
        }
    }

    pub async fn insert<C: ConnectionTrait>(conn: &C, item: &NodeHttp) -> Result<(), StoreError> {
        node_http::Entity::insert(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn update<C: ConnectionTrait>(conn: &C, item: &NodeHttp) -> Result<(), StoreError> {
        node_http::Entity::update(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        node_id: Id,
    ) -> Result<Option<NodeHttp>, StoreError> {
        node_http::Entity::find_by_id(id_bytes(node_id))
            .one(conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, node_id: Id) -> Result<(), StoreError> {
        node_http::Entity::delete_by_id(id_bytes(node_id)).exec(conn).await?;
        Ok(())
    }

    pub async fn list_by_flow<C: ConnectionTrait>(
        conn: &C,
        flow_id: Id,
    ) -> Result<Vec<NodeHttp>, StoreError> {
        let keys = node_keys_of_flow(conn, flow_id).await?;
        let models = node_http::Entity::find()
            .filter(node_http::Column::NodeId.is_in(keys))
            .all(conn)
            .await?;
        models.into_iter().map(to_domain).collect()
    }
}

// ---- node_condition -------------------------------------------------------

pub mod condition {
    use super::*;

    fn to_domain(model: node_condition::Model) -> Result<NodeCondition, StoreError> {
        Ok(NodeCondition {
            node_id: read_id(&model.node_id)?,
            expr: model.expr,
        })
    }

    fn to_active(item: &NodeCondition) -> node_condition::ActiveModel {
        node_condition::ActiveModel {
            node_id: Set(id_bytes(item.node_id)),
            expr: Set(item.expr.clone()),
        }
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        item: &NodeCondition,
    ) -> Result<(), StoreError> {
        node_condition::Entity::insert(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        item: &NodeCondition,
    ) -> Result<(), StoreError> {
        node_condition::Entity::update(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        node_id: Id,
    ) -> Result<Option<NodeCondition>, StoreError> {
        node_condition::Entity::find_by_id(id_bytes(node_id))
            .one(conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, node_id: Id) -> Result<(), StoreError> {
        node_condition::Entity::delete_by_id(id_bytes(node_id)).exec(conn).await?;
        Ok(())
    }

    pub async fn list_by_flow<C: ConnectionTrait>(
        conn: &C,
        flow_id: Id,
    ) -> Result<Vec<NodeCondition>, StoreError> {
        let keys = node_keys_of_flow(conn, flow_id).await?;
        let models = node_condition::Entity::find()
            .filter(node_condition::Column::NodeId.is_in(keys))
            .all(conn)
            .await?;
        models.into_iter().map(to_domain).collect()
    }
}

// ---- node_for -------------------------------------------------------------

pub mod for_count {
    use super::*;

    fn to_domain(model: node_for::Model) -> Result<NodeFor, StoreError> {
        Ok(NodeFor {
            node_id: read_id(&model.node_id)?,
            iter_count: model.iter_count,
            condition_expr: model.condition_expr,
            error_handling: ErrorHandling::from_i32(model.error_handling),
        })
    }

    fn to_active(item: &NodeFor) -> node_for::ActiveModel {
        node_for::ActiveModel {
            node_id: Set(id_bytes(item.node_id)),
            iter_count: Set(item.iter_count),
            condition_expr: Set(item.condition_expr.clone()),
            error_handling: Set(item.error_handling.as_i32()),
        }
    }

    pub async fn insert<C: ConnectionTrait>(conn: &C, item: &NodeFor) -> Result<(), StoreError> {
        node_for::Entity::insert(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn update<C: ConnectionTrait>(conn: &C, item: &NodeFor) -> Result<(), StoreError> {
        node_for::Entity::update(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        node_id: Id,
    ) -> Result<Option<NodeFor>, StoreError> {
        node_for::Entity::find_by_id(id_bytes(node_id))
            .one(conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, node_id: Id) -> Result<(), StoreError> {
        node_for::Entity::delete_by_id(id_bytes(node_id)).exec(conn).await?;
        Ok(())
    }

    pub async fn list_by_flow<C: ConnectionTrait>(
        conn: &C,
        flow_id: Id,
    ) -> Result<Vec<NodeFor>, StoreError> {
        let keys = node_keys_of_flow(conn, flow_id).await?;
        let models = node_for::Entity::find()
            .filter(node_for::Column::NodeId.is_in(keys))
            .all(conn)
            .await?;
        models.into_iter().map(to_domain).collect()
    }
}

// ---- node_for_each --------------------------------------------------------

pub mod for_each {
    use super::*;

    fn to_domain(model: node_for_each::Model) -> Result<NodeForEach, StoreError> {
        Ok(NodeForEach {
            node_id: read_id(&model.node_id)?,
            iter_expr: model.iter_expr,
            condition_expr: model.condition_expr,
            error_handling: ErrorHandling::from_i32(model.error_handling),
        })
    }

    fn to_active(item: &NodeForEach) -> node_for_each::ActiveModel {
        node_for_each::ActiveModel {
            node_id: Set(id_bytes(item.node_id)),
            iter_expr: Set(item.iter_expr.clone()),
            condition_expr: Set(item.condition_expr.clone()),
            error_handling: Set(item.error_handling.as_i32()),
        }
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        item: &NodeForEach,
    ) -> Result<(), StoreError> {
        node_for_each::Entity::insert(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        item: &NodeForEach,
    ) -> Result<(), StoreError> {
        node_for_each::Entity::update(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        node_id: Id,
    ) -> Result<Option<NodeForEach>, StoreError> {
        node_for_each::Entity::find_by_id(id_bytes(node_id))
            .one(conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, node_id: Id) -> Result<(), StoreError> {
        node_for_each::Entity::delete_by_id(id_bytes(node_id)).exec(conn).await?;
        Ok(())
    }

    pub async fn list_by_flow<C: ConnectionTrait>(
        conn: &C,
        flow_id: Id,
    ) -> Result<Vec<NodeForEach>, StoreError> {
        let keys = node_keys_of_flow(conn, flow_id).await?;
        let models = node_for_each::Entity::find()
            .filter(node_for_each::Column::NodeId.is_in(keys))
            .all(conn)
            .await?;
        models.into_iter().map(to_domain).collect()
    }
}

// ---- node_js --------------------------------------------------------------

pub mod js {
    use super::*;

    fn to_domain(model: node_js::Model) -> Result<NodeJs, StoreError> {
        Ok(NodeJs {
            node_id: read_id(&model.node_id)?,
            code: model.code,
            compression_kind: CompressionKind::from_i32(model.compression_kind),
        })
    }

    fn to_active(item: &NodeJs) -> node_js::ActiveModel {
        node_js::ActiveModel {
            node_id: Set(id_bytes(item.node_id)),
            code: Set(item.code.clone()),
            compression_kind: Set(item.compression_kind.as_i32()),
        }
    }

    pub async fn insert<C: ConnectionTrait>(conn: &C, item: &NodeJs) -> Result<(), StoreError> {
        node_js::Entity::insert(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn update<C: ConnectionTrait>(conn: &C, item: &NodeJs) -> Result<(), StoreError> {
        node_js::Entity::update(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        node_id: Id,
    ) -> Result<Option<NodeJs>, StoreError> {
        node_js::Entity::find_by_id(id_bytes(node_id))
            .one(conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, node_id: Id) -> Result<(), StoreError> {
        node_js::Entity::delete_by_id(id_bytes(node_id)).exec(conn).await?;
        Ok(())
    }

    pub async fn list_by_flow<C: ConnectionTrait>(
        conn: &C,
        flow_id: Id,
    ) -> Result<Vec<NodeJs>, StoreError> {
        let keys = node_keys_of_flow(conn, flow_id).await?;
        let models = node_js::Entity::find()
            .filter(node_js::Column::NodeId.is_in(keys))
            .all(conn)
            .await?;
        models.into_iter().map(to_domain).collect()
    }
}

// ---- node_no_op -----------------------------------------------------------

pub mod no_op {
    use super::*;

    fn to_domain(model: node_no_op::Model) -> Result<NodeNoOp, StoreError> {
        Ok(NodeNoOp {
            node_id: read_id(&model.node_id)?,
            kind: NoOpKind::from_i32(model.kind),
        })
    }

    fn to_active(item: &NodeNoOp) -> node_no_op::ActiveModel {
        node_no_op::ActiveModel {
            node_id: Set(id_bytes(item.node_id)),
            kind: Set(item.kind.as_i32()),
        }
    }

    pub async fn insert<C: ConnectionTrait>(conn: &C, item: &NodeNoOp) -> Result<(), StoreError> {
        node_no_op::Entity::insert(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn update<C: ConnectionTrait>(conn: &C, item: &NodeNoOp) -> Result<(), StoreError> {
        node_no_op::Entity::update(to_active(item)).exec(conn).await?;
        Ok(())
    }

    pub async fn get<C: ConnectionTrait>(
        conn: &C,
        node_id: Id,
    ) -> Result<Option<NodeNoOp>, StoreError> {
        node_no_op::Entity::find_by_id(id_bytes(node_id))
            .one(conn)
            .await?
            .map(to_domain)
            .transpose()
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, node_id: Id) -> Result<(), StoreError> {
        node_no_op::Entity::delete_by_id(id_bytes(node_id)).exec(conn).await?;
        Ok(())
    }

    pub async fn list_by_flow<C: ConnectionTrait>(
        conn: &C,
        flow_id: Id,
    ) -> Result<Vec<NodeNoOp>, StoreError> {
        let keys = node_keys_of_flow(conn, flow_id).await?;
        let models = node_no_op::Entity::find()
            .filter(node_no_op::Column::NodeId.is_in(keys))
            .all(conn)
            .await?;
        models.into_iter().map(to_domain).collect()
    }
}
