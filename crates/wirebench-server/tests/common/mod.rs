#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;

use wirebench_engine::js::MockJsExecutor;
use wirebench_engine::model::{
    Edge, EdgeHandle, EdgeKind, Flow, FlowVariable, HttpAssert, HttpDefinition, HttpHeader,
    Node, NodeKind, NodeState, Workspace, WorkspaceRole, WorkspaceUser,
};
use wirebench_engine::model::BodyKind;
use wirebench_engine::Id;

use wirebench_server::access::Caller;
use wirebench_server::{services, AppState};
use wirebench_storage::stores::{http_store, node_store, workspace_store};
use wirebench_storage::{connect, run_migrations};

/// Fresh in-memory database, app state with a mock JS executor, and a
/// caller who is a member of the returned workspace.
pub async fn setup() -> (Arc<AppState>, Caller, Id) {
    let db = connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();

    let caller = Caller::new(Id::generate());
    let workspace = Workspace {
        id: Id::generate(),
        name: "test workspace".into(),
        active_env: serde_json::json!({}),
        global_env: serde_json::json!({}),
        updated_at: Utc::now(),
    };
    workspace_store::insert(&db, &workspace).await.unwrap();
    workspace_store::add_member(
        &db,
        &WorkspaceUser {
            workspace_id: workspace.id,
            user_id: caller.user_id,
            role: WorkspaceRole::Member,
        },
    )
    .await
    .unwrap();

    let state = AppState::new(db, Arc::new(MockJsExecutor::new()));
    (Arc::new(state), caller, workspace.id)
}

/// Create a flow through the service so it gets its start node.
pub async fn create_flow(state: &AppState, caller: &Caller, workspace_id: Id) -> Flow {
    let flow = Flow {
        id: Id::generate(),
        workspace_id,
        name: "test flow".into(),
        running: false,
        duration_ms: None,
        version_parent_id: None,
    };
    services::flow::insert(state, caller, vec![flow.clone()])
        .await
        .unwrap();
    flow
}

pub async fn start_node(state: &AppState, flow_id: Id) -> Node {
    node_store::list_by_flow(&state.db, flow_id)
        .await
        .unwrap()
        .into_iter()
        .find(|n| n.name == "Start")
        .expect("flow creation inserts a start node")
}

pub fn node(flow_id: Id, name: &str, kind: NodeKind) -> Node {
    Node {
        id: Id::generate(),
        flow_id,
        name: name.into(),
        kind,
        pos_x: 0.0,
        pos_y: 0.0,
        state: NodeState::Unspecified,
    }
}

pub fn edge(flow_id: Id, source: Id, target: Id, handle: EdgeHandle) -> Edge {
    Edge {
        id: Id::generate(),
        flow_id,
        source_node_id: source,
        target_node_id: target,
        source_handle: handle,
        kind: EdgeKind::Unspecified,
    }
}

pub fn variable(flow_id: Id, name: &str, value: &str, order: f64) -> FlowVariable {
    FlowVariable {
        id: Id::generate(),
        flow_id,
        name: name.into(),
        value: value.into(),
        enabled: true,
        description: String::new(),
        order,
    }
}

pub async fn http_definition(
    state: &AppState,
    workspace_id: Id,
    method: &str,
    url: &str,
) -> HttpDefinition {
    let definition = HttpDefinition {
        id: Id::generate(),
        workspace_id,
        method: method.into(),
        url: url.into(),
        body_kind: BodyKind::None,
        body_raw: None,
        parent_id: None,
        method_override: None,
        url_override: None,
    };
    http_store::insert_definition(&state.db, &definition)
        .await
        .unwrap();
    definition
}

pub async fn add_header(
    state: &AppState,
    http_id: Id,
    key: &str,
    value: &str,
    is_delta: bool,
    parent_id: Option<Id>,
    value_override: Option<&str>,
) -> HttpHeader {
    let header = HttpHeader {
        id: Id::generate(),
        http_id,
        key: key.into(),
        value: value.into(),
        enabled: true,
        is_delta,
        parent_id,
        value_override: value_override.map(String::from),
    };
    http_store::insert_header(&state.db, &header).await.unwrap();
    header
}

pub async fn add_assert(state: &AppState, http_id: Id, expr: &str) -> HttpAssert {
    let assert = HttpAssert {
        id: Id::generate(),
        http_id,
        expr: expr.into(),
        enabled: true,
        blocking: true,
    };
    http_store::insert_assert(&state.db, &assert).await.unwrap();
    assert
}
