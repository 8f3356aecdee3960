//! Flow run and stop: wiring the engine runner to storage and the hub.
//!
//! `flow_run` executes synchronously in the caller's request context.
//! Everything the run needs is loaded up front so the scheduler never
//! performs an authoring read; state changes flow back through
//! [`StorageRunSink`], which persists each record and publishes its
//! event, keeping commit-before-publish intact for run artifacts.

use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::DatabaseConnection;

use wirebench_engine::event::{Change, ChangeEvent, EventHub, LogEntry};
use wirebench_engine::model::{Flow, HttpResponse, NodeExecution, ResponseAssert, ResponseHeader};
use wirebench_engine::runner::{
    FlowRunner, HttpSpec, NodeConfigs, RunInput, RunOutcome, RunSink, SinkError,
};
use wirebench_engine::Id;

use wirebench_storage::stores::{
    edge_store, execution_store, flow_store, http_store, node_config_store, node_store,
    response_store, variable_store, workspace_store,
};
use wirebench_storage::ChangeTxn;

use crate::access::{self, Caller};
use crate::rpc::RpcError;
use crate::AppState;

/// [`RunSink`] over storage plus the event hub.
pub struct StorageRunSink {
    db: DatabaseConnection,
    hub: Arc<EventHub>,
}

impl StorageRunSink {
    pub fn new(db: DatabaseConnection, hub: Arc<EventHub>) -> Self {
        Self { db, hub }
    }
}

#[async_trait::async_trait]
impl RunSink for StorageRunSink {
    async fn flow_running(
        &self,
        flow: &Flow,
        running: bool,
        duration_ms: Option<i64>,
    ) -> Result<(), SinkError> {
        flow_store::set_running(&self.db, flow.id, running, duration_ms).await?;
        let updated = Flow {
            running,
            duration_ms: duration_ms.or(flow.duration_ms),
            ..flow.clone()
        };
        self.hub
            .publish(ChangeEvent::Flow {
                workspace_id: flow.workspace_id,
                change: Change::update(flow.id, updated),
            })
            .await;
        Ok(())
    }

    async fn upsert_execution(
        &self,
        flow_id: Id,
        execution: &NodeExecution,
    ) -> Result<(), SinkError> {
        execution_store::upsert(&self.db, flow_id, execution).await?;
        self.hub
            .publish(ChangeEvent::Execution {
                flow_id,
                change: Change::update(execution.id, execution.clone()),
            })
            .await;
        Ok(())
    }

    async fn persist_response(
        &self,
        flow_id: Id,
        response: &HttpResponse,
        headers: &[ResponseHeader],
        asserts: &[ResponseAssert],
    ) -> Result<(), SinkError> {
        // One sub-transaction per response: the response row and its
        // children commit together, then their events publish in order.
        let mut txn = ChangeTxn::begin(&self.db).await?;
        response_store::insert_response(txn.conn(), flow_id, response, headers, asserts).await?;
        txn.track(ChangeEvent::Response {
            flow_id,
            change: Change::insert(response.id, response.clone()),
        });
        for header in headers {
            txn.track(ChangeEvent::ResponseHeader {
                flow_id,
                change: Change::insert(header.id, header.clone()),
            });
        }
        for assert in asserts {
            txn.track(ChangeEvent::ResponseAssert {
                flow_id,
                change: Change::insert(assert.id, assert.clone()),
            });
        }
        txn.commit_and_publish(&self.hub).await?;
        Ok(())
    }

    async fn log(&self, entry: LogEntry) -> Result<(), SinkError> {
        self.hub
            .publish(ChangeEvent::Log {
                flow_id: entry.flow_id,
                entry,
            })
            .await;
        Ok(())
    }
}

/// Load everything a run needs before scheduling starts.
async fn load_run_input(db: &DatabaseConnection, flow: Flow) -> Result<RunInput, RpcError> {
    let flow_id = flow.id;
    let nodes = node_store::list_by_flow(db, flow_id).await?;
    let edges = edge_store::list_by_flow(db, flow_id).await?;
    let variables = variable_store::list_by_flow(db, flow_id).await?;

    let mut configs = NodeConfigs::default();
    for config in node_config_store::http::list_by_flow(db, flow_id).await? {
        configs.http.insert(config.node_id, config);
    }
    for config in node_config_store::condition::list_by_flow(db, flow_id).await? {
        configs.condition.insert(config.node_id, config);
    }
    for config in node_config_store::for_count::list_by_flow(db, flow_id).await? {
        configs.for_count.insert(config.node_id, config);
    }
    for config in node_config_store::for_each::list_by_flow(db, flow_id).await? {
        configs.for_each.insert(config.node_id, config);
    }
    for config in node_config_store::js::list_by_flow(db, flow_id).await? {
        configs.js.insert(config.node_id, config);
    }
    for config in node_config_store::no_op::list_by_flow(db, flow_id).await? {
        configs.no_op.insert(config.node_id, config);
    }

    let mut http = HashMap::new();
    for config in configs.http.values() {
        let base = http_store::load_bundle(db, config.http_id)
            .await?
            .ok_or_else(|| {
                RpcError::failed_precondition(format!(
                    "request node {} references missing http definition",
                    config.node_id
                ))
            })?;
        let delta = match config.delta_http_id {
            Some(delta_id) => Some(http_store::load_bundle(db, delta_id).await?.ok_or_else(
                || {
                    RpcError::failed_precondition(format!(
                        "request node {} references missing delta definition",
                        config.node_id
                    ))
                },
            )?),
            None => None,
        };
        http.insert(config.node_id, HttpSpec { base, delta });
    }

    let mut env = serde_json::Map::new();
    if let Some(workspace) = workspace_store::get(db, flow.workspace_id).await? {
        for source in [&workspace.global_env, &workspace.active_env] {
            if let serde_json::Value::Object(map) = source {
                for (k, v) in map {
                    env.insert(k.clone(), v.clone());
                }
            }
        }
    }

    Ok(RunInput {
        flow,
        nodes,
        edges,
        variables,
        env,
        configs,
        http,
    })
}

/// Execute one run of the flow, synchronously.
pub async fn flow_run(
    state: &AppState,
    caller: &Caller,
    flow_id: Id,
) -> Result<RunOutcome, RpcError> {
    let flow = access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let input = load_run_input(&state.db, flow).await?;

    let cancel = state
        .registry
        .begin(flow_id)
        .ok_or_else(|| RpcError::failed_precondition("flow is already running"))?;

    let sink = Arc::new(StorageRunSink::new(state.db.clone(), state.hub.clone()));
    let runner = FlowRunner::new(sink, state.js.clone(), state.http.clone());
    let result = runner.run(input, cancel).await;
    state.registry.finish(flow_id);

    Ok(result?)
}

/// Cancel the live run if any. Idempotent: success whether or not a
/// run was live, and regardless of how many times it is called.
pub async fn flow_stop(state: &AppState, caller: &Caller, flow_id: Id) -> Result<(), RpcError> {
    access::ensure_flow_access(&state.db, caller, flow_id).await?;
    let was_live = state.registry.stop(flow_id);
    tracing::debug!(flow_id = %flow_id, was_live, "flow stop requested");
    Ok(())
}
