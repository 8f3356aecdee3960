//! Workspaces and memberships. Membership is the whole authorization
//! model: a user sees exactly the workspaces they hold a row for.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use wirebench_engine::model::{Workspace, WorkspaceRole, WorkspaceUser};
use wirebench_engine::Id;

use super::{id_bytes, read_id};
use crate::models::{workspace, workspace_user};
use crate::StoreError;

fn to_domain(model: workspace::Model) -> Result<Workspace, StoreError> {
    Ok(Workspace {
        id: read_id(&model.id)?,
        name: model.name,
        active_env: model.active_env,
        global_env: model.global_env,
        updated_at: model.updated_at.and_utc(),
    })
}

fn to_active(item: &Workspace) -> workspace::ActiveModel {
    workspace::ActiveModel {
        id: Set(id_bytes(item.id)),
        name: Set(item.name.clone()),
        active_env: Set(item.active_env.clone()),
        global_env: Set(item.global_env.clone()),
        updated_at: Set(item.updated_at.naive_utc()),
    }
}

pub async fn insert<C: ConnectionTrait>(conn: &C, item: &Workspace) -> Result<(), StoreError> {
    workspace::Entity::insert(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn update<C: ConnectionTrait>(conn: &C, item: &Workspace) -> Result<(), StoreError> {
    workspace::Entity::update(to_active(item)).exec(conn).await?;
    Ok(())
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: Id) -> Result<Option<Workspace>, StoreError> {
    workspace::Entity::find_by_id(id_bytes(id))
        .one(conn)
        .await?
        .map(to_domain)
        .transpose()
}

pub async fn add_member<C: ConnectionTrait>(
    conn: &C,
    member: &WorkspaceUser,
) -> Result<(), StoreError> {
    workspace_user::Entity::insert(workspace_user::ActiveModel {
        workspace_id: Set(id_bytes(member.workspace_id)),
        user_id: Set(id_bytes(member.user_id)),
        role: Set(member.role.as_i32()),
    })
    .exec(conn)
    .await?;
    Ok(())
}

/// The workspaces a user belongs to, in stable id order.
pub async fn accessible_workspace_ids<C: ConnectionTrait>(
    conn: &C,
    user_id: Id,
) -> Result<Vec<Id>, StoreError> {
    let rows = workspace_user::Entity::find()
        .filter(workspace_user::Column::UserId.eq(id_bytes(user_id)))
        .all(conn)
        .await?;
    let mut ids = rows
        .iter()
        .map(|row| read_id(&row.workspace_id))
        .collect::<Result<Vec<_>, _>>()?;
    ids.sort();
    Ok(ids)
}

pub async fn member_role<C: ConnectionTrait>(
    conn: &C,
    workspace_id: Id,
    user_id: Id,
) -> Result<Option<WorkspaceRole>, StoreError> {
    let row = workspace_user::Entity::find_by_id((id_bytes(workspace_id), id_bytes(user_id)))
        .one(conn)
        .await?;
    Ok(row.map(|r| WorkspaceRole::from_i32(r.role)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;
    use chrono::Utc;

    fn workspace() -> Workspace {
        Workspace {
            id: Id::generate(),
            name: "team".into(),
            active_env: serde_json::json!({"base_url": "https://api.example.com"}),
            global_env: serde_json::json!({}),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn membership_controls_accessible_ids() {
        let db = test_db().await;
        let ws = workspace();
        insert(&db, &ws).await.unwrap();
        let user = Id::generate();
        add_member(
            &db,
            &WorkspaceUser {
                workspace_id: ws.id,
                user_id: user,
                role: WorkspaceRole::Member,
            },
        )
        .await
        .unwrap();

        assert_eq!(accessible_workspace_ids(&db, user).await.unwrap(), vec![ws.id]);
        assert!(accessible_workspace_ids(&db, Id::generate()).await.unwrap().is_empty());
        assert_eq!(
            member_role(&db, ws.id, user).await.unwrap(),
            Some(WorkspaceRole::Member)
        );
        assert_eq!(member_role(&db, ws.id, Id::generate()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn workspace_env_round_trips_as_json() {
        let db = test_db().await;
        let ws = workspace();
        insert(&db, &ws).await.unwrap();

        let loaded = get(&db, ws.id).await.unwrap().unwrap();
        assert_eq!(loaded.active_env["base_url"], "https://api.example.com");
    }
}
