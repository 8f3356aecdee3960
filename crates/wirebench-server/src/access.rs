//! Workspace membership gate.
//!
//! Membership in a workspace is the whole authorization model. Every
//! failure is `NotFound`, never a permission code, so callers cannot
//! probe for ids they do not own.

use sea_orm::DatabaseConnection;

use wirebench_engine::model::{Flow, Node};
use wirebench_engine::Id;

use wirebench_storage::stores::{flow_store, node_store, workspace_store};

use crate::rpc::{Code, RpcError};

// Only the denied/absent path is renamed; infrastructure failures
// from the inner gate keep their own code.
pub(crate) fn mask_not_found(err: RpcError, message: &'static str) -> RpcError {
    match err.code {
        Code::NotFound => RpcError::not_found(message),
        _ => err,
    }
}

/// Caller identity, produced by the auth middleware upstream.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: Id,
}

impl Caller {
    pub fn new(user_id: Id) -> Self {
        Self { user_id }
    }
}

/// The workspace ids the caller is a member of.
pub async fn accessible_workspaces(
    db: &DatabaseConnection,
    caller: &Caller,
) -> Result<Vec<Id>, RpcError> {
    Ok(workspace_store::accessible_workspace_ids(db, caller.user_id).await?)
}

/// Every flow in every workspace the caller belongs to, in id order.
pub async fn list_accessible_flows(
    db: &DatabaseConnection,
    caller: &Caller,
) -> Result<Vec<Flow>, RpcError> {
    let workspaces = accessible_workspaces(db, caller).await?;
    Ok(flow_store::list_by_workspaces(db, &workspaces).await?)
}

pub async fn ensure_workspace_access(
    db: &DatabaseConnection,
    caller: &Caller,
    workspace_id: Id,
) -> Result<(), RpcError> {
    let role = workspace_store::member_role(db, workspace_id, caller.user_id).await?;
    match role {
        Some(_) => Ok(()),
        None => Err(RpcError::not_found("workspace not found")),
    }
}

/// Resolve a flow the caller can touch. Absent and inaccessible are
/// indistinguishable by design.
pub async fn ensure_flow_access(
    db: &DatabaseConnection,
    caller: &Caller,
    flow_id: Id,
) -> Result<Flow, RpcError> {
    let flow = flow_store::get(db, flow_id)
        .await?
        .ok_or_else(|| RpcError::not_found("flow not found"))?;
    ensure_workspace_access(db, caller, flow.workspace_id)
        .await
        .map_err(|err| mask_not_found(err, "flow not found"))?;
    Ok(flow)
}

/// Resolve a flow for mutation. A flow created by duplicate carries
/// `version_parent_id` and is an immutable version snapshot.
pub async fn ensure_flow_mutable(
    db: &DatabaseConnection,
    caller: &Caller,
    flow_id: Id,
) -> Result<Flow, RpcError> {
    let flow = ensure_flow_access(db, caller, flow_id).await?;
    if flow.version_parent_id.is_some() {
        return Err(RpcError::failed_precondition(
            "flow is a version snapshot and cannot be modified",
        ));
    }
    Ok(flow)
}

pub async fn ensure_node_access(
    db: &DatabaseConnection,
    caller: &Caller,
    node_id: Id,
) -> Result<Node, RpcError> {
    let node = node_store::get(db, node_id)
        .await?
        .ok_or_else(|| RpcError::not_found("node not found"))?;
    ensure_flow_access(db, caller, node.flow_id)
        .await
        .map_err(|err| mask_not_found(err, "node not found"))?;
    Ok(node)
}

/// Like [`ensure_node_access`], additionally rejecting nodes that
/// belong to a version snapshot.
pub async fn ensure_node_mutable(
    db: &DatabaseConnection,
    caller: &Caller,
    node_id: Id,
) -> Result<Node, RpcError> {
    let node = node_store::get(db, node_id)
        .await?
        .ok_or_else(|| RpcError::not_found("node not found"))?;
    ensure_flow_mutable(db, caller, node.flow_id)
        .await
        .map_err(|err| mask_not_found(err, "node not found"))?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Code;
    use chrono::Utc;
    use wirebench_engine::model::{Workspace, WorkspaceRole, WorkspaceUser};
    use wirebench_storage::{connect, run_migrations};

    async fn setup() -> (DatabaseConnection, Caller, Id) {
        let db = connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();
        let caller = Caller::new(Id::generate());
        let ws = Workspace {
            id: Id::generate(),
            name: "team".into(),
            active_env: serde_json::json!({}),
            global_env: serde_json::json!({}),
            updated_at: Utc::now(),
        };
        workspace_store::insert(&db, &ws).await.unwrap();
        workspace_store::add_member(
            &db,
            &WorkspaceUser {
                workspace_id: ws.id,
                user_id: caller.user_id,
                role: WorkspaceRole::Member,
            },
        )
        .await
        .unwrap();
        (db, caller, ws.id)
    }

    #[tokio::test]
    async fn foreign_flow_is_not_found_not_permission_denied() {
        let (db, caller, _ws) = setup().await;
        let foreign = Flow {
            id: Id::generate(),
            workspace_id: Id::generate(),
            name: "other".into(),
            running: false,
            duration_ms: None,
            version_parent_id: None,
        };
        flow_store::insert(&db, &foreign).await.unwrap();

        let err = ensure_flow_access(&db, &caller, foreign.id).await.unwrap_err();
        assert_eq!(err.code, Code::NotFound);
    }

    #[tokio::test]
    async fn infrastructure_failure_is_not_masked_as_not_found() {
        use sea_orm::ConnectionTrait;

        let (db, caller, ws) = setup().await;
        let flow = Flow {
            id: Id::generate(),
            workspace_id: ws,
            name: "mine".into(),
            running: false,
            duration_ms: None,
            version_parent_id: None,
        };
        flow_store::insert(&db, &flow).await.unwrap();

        db.execute_unprepared("DROP TABLE workspace_user")
            .await
            .unwrap();

        let err = ensure_flow_access(&db, &caller, flow.id).await.unwrap_err();
        assert_eq!(err.code, Code::Internal);
    }

    #[tokio::test]
    async fn version_snapshot_is_immutable() {
        let (db, caller, ws) = setup().await;
        let original = Flow {
            id: Id::generate(),
            workspace_id: ws,
            name: "original".into(),
            running: false,
            duration_ms: None,
            version_parent_id: None,
        };
        let snapshot = Flow {
            id: Id::generate(),
            workspace_id: ws,
            name: "original".into(),
            running: false,
            duration_ms: None,
            version_parent_id: Some(original.id),
        };
        flow_store::insert(&db, &original).await.unwrap();
        flow_store::insert(&db, &snapshot).await.unwrap();

        let resolved = ensure_flow_mutable(&db, &caller, original.id).await.unwrap();
        assert_eq!(resolved.id, original.id);

        let err = ensure_flow_mutable(&db, &caller, snapshot.id).await.unwrap_err();
        assert_eq!(err.code, Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn member_flow_resolves() {
        let (db, caller, ws) = setup().await;
        let flow = Flow {
            id: Id::generate(),
            workspace_id: ws,
            name: "mine".into(),
            running: false,
            duration_ms: None,
            version_parent_id: None,
        };
        flow_store::insert(&db, &flow).await.unwrap();

        let resolved = ensure_flow_access(&db, &caller, flow.id).await.unwrap();
        assert_eq!(resolved.id, flow.id);
        assert_eq!(list_accessible_flows(&db, &caller).await.unwrap().len(), 1);
    }
}
