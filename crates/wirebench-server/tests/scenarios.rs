//! End-to-end scenarios across CRUD, sync, and the runner.

mod common;

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wirebench_engine::event::{Change, ChangeKind};
use wirebench_engine::model::{
    AssertResult, CompressionKind, EdgeHandle, ErrorHandling, ExecutionState, HttpDefinition,
    NodeCondition, NodeFor, NodeHttp, NodeJs, NodeKind,
};
use wirebench_engine::Id;

use wirebench_server::services::node_config::NodeForPatch;
use wirebench_server::{services, sync, AppState};
use wirebench_storage::stores::{
    edge_store, http_store, node_config_store, node_store, variable_store,
};

use common::*;

async fn drain_until<T: Clone>(
    stream: &mut sync::SyncStream<T>,
    mut done: impl FnMut(&[Change<T>]) -> bool,
) -> Vec<Change<T>> {
    let mut seen = Vec::new();
    while !done(&seen) {
        let batch = tokio::time::timeout(Duration::from_secs(10), stream.next_batch())
            .await
            .expect("timed out waiting for sync events")
            .expect("stream closed early");
        seen.extend(batch);
    }
    seen
}

#[tokio::test]
async fn assertion_events_precede_request_success() {
    let (state, caller, ws) = setup().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let flow = create_flow(&state, &caller, ws).await;
    let start = start_node(&state, flow.id).await;
    let request = node(flow.id, "request", NodeKind::HttpRequest);
    services::node::insert(&state, &caller, vec![request.clone()])
        .await
        .unwrap();
    let base = http_definition(&state, ws, "GET", &server.uri()).await;
    add_assert(&state, base.id, "response.status == 200").await;
    services::node_config::http::insert(
        &state,
        &caller,
        vec![NodeHttp {
            node_id: request.id,
            http_id: base.id,
            delta_http_id: None,
            has_request_config: true,
        }],
    )
    .await
    .unwrap();
    services::edge::insert(
        &state,
        &caller,
        vec![edge(flow.id, start.id, request.id, EdgeHandle::Unspecified)],
    )
    .await
    .unwrap();

    let mut executions = sync::execution_sync(&state, &caller, flow.id).await.unwrap();
    let mut responses = sync::response_sync(&state, &caller, flow.id).await.unwrap();
    let mut asserts = sync::response_assert_sync(&state, &caller, flow.id).await.unwrap();
    assert!(executions.take_snapshot().is_empty());

    let outcome = services::flow::run(&state, &caller, flow.id).await.unwrap();
    assert!(!outcome.failed);

    let exec_events = drain_until(&mut executions, |seen| {
        seen.iter().any(|c| {
            c.item
                .as_ref()
                .is_some_and(|e| e.node_id == request.id && e.state == ExecutionState::Success)
        })
    })
    .await;

    // Running strictly before success, sharing one execution id.
    let request_events: Vec<_> = exec_events
        .iter()
        .filter_map(|c| c.item.as_ref())
        .filter(|e| e.node_id == request.id)
        .collect();
    assert_eq!(request_events[0].state, ExecutionState::Running);
    let success = request_events.last().unwrap();
    assert_eq!(success.state, ExecutionState::Success);
    assert_eq!(request_events[0].id, success.id);

    // The response and its assert were published before the success
    // event, so they are already waiting in their streams.
    let response_events = drain_until(&mut responses, |seen| !seen.is_empty()).await;
    assert_eq!(response_events[0].kind, ChangeKind::Insert);
    let response = response_events[0].item.as_ref().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(success.response_id, Some(response.id));

    let assert_events = drain_until(&mut asserts, |seen| !seen.is_empty()).await;
    let evaluated = assert_events[0].item.as_ref().unwrap();
    assert_eq!(evaluated.result, AssertResult::Passed);
    assert_eq!(evaluated.response_id, response.id);
}

#[tokio::test]
async fn delta_overrides_method_and_header() {
    let (state, caller, ws) = setup().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Test", "Delta"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let flow = create_flow(&state, &caller, ws).await;
    let start = start_node(&state, flow.id).await;
    let request = node(flow.id, "request", NodeKind::HttpRequest);
    services::node::insert(&state, &caller, vec![request.clone()])
        .await
        .unwrap();

    let base = http_definition(&state, ws, "GET", &server.uri()).await;
    let base_header = add_header(&state, base.id, "X-Test", "Base", false, None, None).await;
    let delta = HttpDefinition {
        id: Id::generate(),
        workspace_id: ws,
        parent_id: Some(base.id),
        method_override: Some("POST".into()),
        ..base.clone()
    };
    http_store::insert_definition(&state.db, &delta).await.unwrap();
    add_header(
        &state,
        delta.id,
        "X-Test",
        "Base",
        true,
        Some(base_header.id),
        Some("Delta"),
    )
    .await;

    services::node_config::http::insert(
        &state,
        &caller,
        vec![NodeHttp {
            node_id: request.id,
            http_id: base.id,
            delta_http_id: Some(delta.id),
            has_request_config: true,
        }],
    )
    .await
    .unwrap();
    services::edge::insert(
        &state,
        &caller,
        vec![edge(flow.id, start.id, request.id, EdgeHandle::Unspecified)],
    )
    .await
    .unwrap();

    let outcome = services::flow::run(&state, &caller, flow.id).await.unwrap();
    assert!(!outcome.failed);
    // MockServer verifies the expected POST with the delta header on drop.
}

#[tokio::test]
async fn iteration_count_update_to_zero_propagates() {
    let (state, caller, ws) = setup().await;
    let flow = create_flow(&state, &caller, ws).await;
    let loop_node = node(flow.id, "loop", NodeKind::ForCount);
    services::node::insert(&state, &caller, vec![loop_node.clone()])
        .await
        .unwrap();
    services::node_config::for_count::insert(
        &state,
        &caller,
        vec![NodeFor {
            node_id: loop_node.id,
            iter_count: 5,
            condition_expr: None,
            error_handling: ErrorHandling::Break,
        }],
    )
    .await
    .unwrap();

    let mut stream = sync::node_for_sync(&state, &caller, flow.id).await.unwrap();
    let snapshot = stream.take_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].item.as_ref().unwrap().iter_count, 5);

    services::node_config::for_count::update(
        &state,
        &caller,
        vec![NodeForPatch {
            node_id: loop_node.id,
            iter_count: Some(0),
            ..Default::default()
        }],
    )
    .await
    .unwrap();

    let events = drain_until(&mut stream, |seen| !seen.is_empty()).await;
    assert_eq!(events[0].kind, ChangeKind::Update);
    assert_eq!(events[0].item.as_ref().unwrap().iter_count, 0);

    let stored = node_config_store::for_count::get(&state.db, loop_node.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.iter_count, 0);
}

#[tokio::test]
async fn duplicate_clones_the_graph_but_not_http_definitions() {
    let (state, caller, ws) = setup().await;
    let flow = create_flow(&state, &caller, ws).await;

    let request = node(flow.id, "request", NodeKind::HttpRequest);
    let loop_node = node(flow.id, "loop", NodeKind::ForCount);
    let script = node(flow.id, "script", NodeKind::Javascript);
    let branch = node(flow.id, "branch", NodeKind::Condition);
    services::node::insert(
        &state,
        &caller,
        vec![
            request.clone(),
            loop_node.clone(),
            script.clone(),
            branch.clone(),
        ],
    )
    .await
    .unwrap();

    let base = http_definition(&state, ws, "GET", "https://api.example.com").await;
    services::node_config::http::insert(
        &state,
        &caller,
        vec![NodeHttp {
            node_id: request.id,
            http_id: base.id,
            delta_http_id: None,
            has_request_config: true,
        }],
    )
    .await
    .unwrap();
    services::node_config::for_count::insert(
        &state,
        &caller,
        vec![NodeFor {
            node_id: loop_node.id,
            iter_count: 3,
            condition_expr: None,
            error_handling: ErrorHandling::Ignore,
        }],
    )
    .await
    .unwrap();
    services::node_config::js::insert(
        &state,
        &caller,
        vec![NodeJs {
            node_id: script.id,
            code: b"1 + 1".to_vec(),
            compression_kind: CompressionKind::None,
        }],
    )
    .await
    .unwrap();
    services::node_config::condition::insert(
        &state,
        &caller,
        vec![NodeCondition {
            node_id: branch.id,
            expr: "status == 200".into(),
        }],
    )
    .await
    .unwrap();

    services::edge::insert(
        &state,
        &caller,
        vec![
            edge(flow.id, request.id, loop_node.id, EdgeHandle::Unspecified),
            edge(flow.id, loop_node.id, script.id, EdgeHandle::LoopBody),
        ],
    )
    .await
    .unwrap();
    services::variable::insert(
        &state,
        &caller,
        vec![
            variable(flow.id, "host", "api.example.com", 1.0),
            variable(flow.id, "token", "abc", 2.0),
        ],
    )
    .await
    .unwrap();

    let definitions_before = http_store::count_definitions(&state.db).await.unwrap();
    let copy = services::flow::duplicate(&state, &caller, flow.id).await.unwrap();

    let source_nodes = node_store::list_by_flow(&state.db, flow.id).await.unwrap();
    let copy_nodes = node_store::list_by_flow(&state.db, copy.id).await.unwrap();
    assert_eq!(copy_nodes.len(), source_nodes.len());
    assert_eq!(
        edge_store::list_by_flow(&state.db, copy.id).await.unwrap().len(),
        2
    );
    assert_eq!(
        variable_store::list_by_flow(&state.db, copy.id).await.unwrap().len(),
        2
    );
    assert_eq!(
        http_store::count_definitions(&state.db).await.unwrap(),
        definitions_before
    );

    // Unique counterpart per source node, same name/kind/position,
    // disjoint ids.
    for source in &source_nodes {
        let matches: Vec<_> = copy_nodes
            .iter()
            .filter(|n| n.name == source.name && n.kind == source.kind)
            .collect();
        assert_eq!(matches.len(), 1, "node {} must map uniquely", source.name);
        let mapped = matches[0];
        assert_ne!(mapped.id, source.id);
        assert_eq!(mapped.pos_x, source.pos_x);
        assert_eq!(mapped.pos_y, source.pos_y);
    }

    // The cloned request node references the same shared definition.
    let copied_request = copy_nodes.iter().find(|n| n.name == "request").unwrap();
    let copied_config = node_config_store::http::get(&state.db, copied_request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(copied_config.http_id, base.id);

    // Adjacency carries over under the node mapping.
    let copied_loop = copy_nodes.iter().find(|n| n.name == "loop").unwrap();
    let copied_script = copy_nodes.iter().find(|n| n.name == "script").unwrap();
    let copy_edges = edge_store::list_by_flow(&state.db, copy.id).await.unwrap();
    assert!(copy_edges.iter().any(|e| {
        e.source_node_id == copied_request.id && e.target_node_id == copied_loop.id
    }));
    assert!(copy_edges.iter().any(|e| {
        e.source_node_id == copied_loop.id
            && e.target_node_id == copied_script.id
            && e.source_handle == EdgeHandle::LoopBody
    }));
}

#[tokio::test]
async fn deleting_missing_sub_config_publishes_invalidation() {
    let (state, caller, ws) = setup().await;
    let flow = create_flow(&state, &caller, ws).await;
    let request = node(flow.id, "request", NodeKind::HttpRequest);
    services::node::insert(&state, &caller, vec![request.clone()])
        .await
        .unwrap();

    let mut stream = sync::node_http_sync(&state, &caller, flow.id).await.unwrap();
    assert!(stream.take_snapshot().is_empty());

    services::node_config::http::delete(&state, &caller, vec![request.id])
        .await
        .unwrap();

    let events = drain_until(&mut stream, |seen| !seen.is_empty()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::Update);
    assert_eq!(events[0].id, request.id);
    assert!(events[0].item.is_none(), "invalidation carries no item");
}

#[tokio::test]
async fn twenty_concurrent_node_js_inserts_all_land() {
    let (state, caller, ws) = setup().await;
    let flow = create_flow(&state, &caller, ws).await;

    let mut nodes = Vec::new();
    for i in 0..20 {
        nodes.push(node(flow.id, &format!("script-{i}"), NodeKind::Javascript));
    }
    services::node::insert(&state, &caller, nodes.clone()).await.unwrap();

    let mut handles = Vec::new();
    for target in &nodes {
        let state: Arc<AppState> = state.clone();
        let caller = caller;
        let node_id = target.id;
        handles.push(tokio::spawn(async move {
            services::node_config::js::insert(
                &state,
                &caller,
                vec![NodeJs {
                    node_id,
                    code: b"export default 1".to_vec(),
                    compression_kind: CompressionKind::None,
                }],
            )
            .await
        }));
    }

    let joined = tokio::time::timeout(Duration::from_secs(30), async {
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    })
    .await
    .expect("concurrent inserts must not deadlock");
    for result in joined {
        result.unwrap();
    }

    let stored = node_config_store::js::list_by_flow(&state.db, flow.id).await.unwrap();
    assert_eq!(stored.len(), 20);
}
