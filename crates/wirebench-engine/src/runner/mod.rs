//! Flow runner: single-threaded cooperative scheduler per run.
//!
//! One task owns the traversal; blocking side-effects (outbound HTTP,
//! the JS worker) run as awaited sub-operations under the per-node
//! timeout. **Ordering invariants**: a node emits `running` at most
//! once and strictly before its terminal state; response artifacts
//! are acked by the side-channel drainer before the owning node goes
//! terminal; each node-per-iteration gets one execution id shared by
//! all of its events.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::event::LogEntry;
use crate::expr::evaluate_bool;
use crate::id::Id;
use crate::js::JsExecutor;
use crate::model::{
    AssertResult, CompressionKind, Edge, EdgeHandle, ErrorHandling, ExecutionState, Flow,
    FlowVariable, HttpResponse, Node, NodeCondition, NodeExecution, NodeFor, NodeForEach,
    NodeHttp, NodeJs, NodeKind, NodeNoOp, ResponseAssert, ResponseHeader,
};
use crate::resolver::{self, HttpBundle, ResolvedBody, ResolvedRequest};
use crate::scope::Scope;

pub mod graph;
pub mod registry;
pub mod side_channel;

pub use graph::{GraphError, RunGraph};
pub use registry::{CancelSignal, RunRegistry};
pub use side_channel::ResponseArtifact;

pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(60);

pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RunError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("flow run canceled")]
    Canceled,

    #[error("storage sink failed: {source}")]
    Sink { source: SinkError },
}

impl RunError {
    fn sink(source: SinkError) -> Self {
        Self::Sink { source }
    }
}

/// Where the runner reports state. The server implements this over
/// storage plus the event hub; each method persists and publishes.
#[async_trait]
pub trait RunSink: Send + Sync {
    /// Flip the flow's running flag and publish the flow update.
    async fn flow_running(
        &self,
        flow: &Flow,
        running: bool,
        duration_ms: Option<i64>,
    ) -> Result<(), SinkError>;

    /// Upsert one execution record and publish it.
    async fn upsert_execution(
        &self,
        flow_id: Id,
        execution: &NodeExecution,
    ) -> Result<(), SinkError>;

    /// Persist a response with its headers and evaluated asserts, then
    /// publish their insert events.
    async fn persist_response(
        &self,
        flow_id: Id,
        response: &HttpResponse,
        headers: &[ResponseHeader],
        asserts: &[ResponseAssert],
    ) -> Result<(), SinkError>;

    /// Advisory run log line.
    async fn log(&self, entry: LogEntry) -> Result<(), SinkError>;
}

/// Sub-configs indexed by node id, preloaded before the run.
#[derive(Debug, Clone, Default)]
pub struct NodeConfigs {
    pub http: HashMap<Id, NodeHttp>,
    pub condition: HashMap<Id, NodeCondition>,
    pub for_count: HashMap<Id, NodeFor>,
    pub for_each: HashMap<Id, NodeForEach>,
    pub js: HashMap<Id, NodeJs>,
    pub no_op: HashMap<Id, NodeNoOp>,
}

/// A request node's definition pair, resolved lazily at dispatch.
#[derive(Debug, Clone)]
pub struct HttpSpec {
    pub base: HttpBundle,
    pub delta: Option<HttpBundle>,
}

/// Everything a run needs, loaded by the caller before scheduling
/// starts so the run itself performs no authoring reads.
pub struct RunInput {
    pub flow: Flow,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub variables: Vec<FlowVariable>,
    /// Workspace environment bindings, already merged.
    pub env: Map<String, Value>,
    pub configs: NodeConfigs,
    /// Keyed by request node id.
    pub http: HashMap<Id, HttpSpec>,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub duration_ms: i64,
    /// Whether any node failed. Node failures are non-fatal to the run.
    pub failed: bool,
}

pub struct FlowRunner {
    sink: Arc<dyn RunSink>,
    js: Arc<dyn JsExecutor>,
    http: reqwest::Client,
    node_timeout: Duration,
}

struct RunCtx<'i> {
    flow_id: Id,
    input: &'i RunInput,
    graph: &'i RunGraph,
    scope: Scope,
    side: mpsc::Sender<ResponseArtifact>,
    cancel: CancelSignal,
    failed: bool,
}

struct NodeOutcome {
    success: bool,
    output: Option<Value>,
    error: Option<String>,
    response_id: Option<Id>,
}

impl NodeOutcome {
    fn success(output: Option<Value>) -> Self {
        Self {
            success: true,
            output,
            error: None,
            response_id: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(message.into()),
            response_id: None,
        }
    }
}

impl FlowRunner {
    pub fn new(sink: Arc<dyn RunSink>, js: Arc<dyn JsExecutor>, http: reqwest::Client) -> Self {
        Self {
            sink,
            js,
            http,
            node_timeout: DEFAULT_NODE_TIMEOUT,
        }
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    /// Execute one flow run to completion.
    ///
    /// The flow is marked running before the first node and unmarked
    /// on the way out even when the run errored or was canceled.
    pub async fn run(&self, input: RunInput, cancel: CancelSignal) -> Result<RunOutcome, RunError> {
        let graph = RunGraph::build(&input.nodes, &input.edges, &input.configs)?;
        let flow_id = input.flow.id;

        self.sink
            .flow_running(&input.flow, true, None)
            .await
            .map_err(RunError::sink)?;
        self.log(flow_id, None, format!("flow '{}' started", input.flow.name))
            .await;
        tracing::info!(flow_id = %flow_id, "flow run started");

        let started = Instant::now();
        let (side, drainer) = side_channel::spawn_drainer(self.sink.clone());
        let mut ctx = RunCtx {
            flow_id,
            input: &input,
            graph: &graph,
            scope: Scope::new(base_scope(&input)),
            side,
            cancel,
            failed: false,
        };
        let run_result = self.run_subgraph(&mut ctx, vec![graph.start()]).await;
        let failed = ctx.failed || matches!(run_result, Ok(true));
        drop(ctx);
        let drain_result = drainer.await;

        let duration_ms = started.elapsed().as_millis() as i64;
        self.sink
            .flow_running(&input.flow, false, Some(duration_ms))
            .await
            .map_err(RunError::sink)?;
        self.log(
            flow_id,
            None,
            format!("flow '{}' finished in {duration_ms} ms", input.flow.name),
        )
        .await;
        tracing::info!(flow_id = %flow_id, duration_ms, failed, "flow run finished");

        run_result?;
        match drain_result {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(RunError::Sink { source }),
            Err(join_error) => {
                return Err(RunError::Sink {
                    source: Box::new(join_error),
                });
            }
        }
        Ok(RunOutcome {
            duration_ms,
            failed,
        })
    }

    /// Run every node reachable from `roots` until the queue drains.
    /// Returns whether any node in this subgraph failed, which loop
    /// nodes use for their error-handling mode.
    fn run_subgraph<'a, 'i>(
        &'a self,
        ctx: &'a mut RunCtx<'i>,
        roots: Vec<Id>,
    ) -> BoxFuture<'a, Result<bool, RunError>>
    where
        'i: 'a,
    {
        Box::pin(async move {
            let mut queue: VecDeque<Id> = roots.into();
            let mut failed = false;
            while let Some(node_id) = queue.pop_front() {
                if ctx.cancel.is_canceled() {
                    return Err(RunError::Canceled);
                }
                let node = match ctx.graph.node(node_id) {
                    Some(node) => node.clone(),
                    None => continue,
                };
                let dispatched = match node.kind {
                    NodeKind::Start | NodeKind::NoOp => self.exec_no_op(ctx, &node).await?,
                    NodeKind::Condition => self.exec_condition(ctx, &node).await?,
                    NodeKind::HttpRequest => self.exec_request(ctx, &node).await?,
                    NodeKind::Javascript => self.exec_javascript(ctx, &node).await?,
                    NodeKind::ForCount | NodeKind::ForEach => self.exec_loop(ctx, &node).await?,
                    // Rejected at graph build.
                    NodeKind::Unspecified => continue,
                };
                failed |= dispatched.node_failed;
                queue.extend(dispatched.next);
            }
            Ok(failed)
        })
    }

    async fn exec_no_op(&self, ctx: &mut RunCtx<'_>, node: &Node) -> Result<Dispatched, RunError> {
        // Instantaneous vertex: a single terminal event, no `running`.
        let execution = NodeExecution {
            id: Id::generate(),
            node_id: node.id,
            name: node.name.clone(),
            state: ExecutionState::Success,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            error: None,
            input: None,
            output: None,
            response_id: None,
        };
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;
        Ok(Dispatched {
            node_failed: false,
            next: ctx.graph.successors(node.id, EdgeHandle::Unspecified),
        })
    }

    async fn exec_condition(
        &self,
        ctx: &mut RunCtx<'_>,
        node: &Node,
    ) -> Result<Dispatched, RunError> {
        let Some(config) = ctx.input.configs.condition.get(&node.id) else {
            return Ok(Dispatched::none());
        };
        let input_ctx = ctx.scope.flatten();
        let mut execution = running_execution(node, input_ctx.clone());
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;

        execution.completed_at = Some(Utc::now());
        let next = match evaluate_bool(&config.expr, &input_ctx) {
            Ok(truth) => {
                execution.state = ExecutionState::Success;
                execution.output = Some(json!(truth));
                let handle = if truth { EdgeHandle::Then } else { EdgeHandle::Else };
                ctx.graph.successors(node.id, handle)
            }
            Err(error) => {
                execution.state = ExecutionState::Failure;
                execution.error = Some(error.to_string());
                ctx.graph.successors(node.id, EdgeHandle::Else)
            }
        };
        let node_failed = execution.state == ExecutionState::Failure;
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;
        if node_failed {
            ctx.failed = true;
            self.log(
                ctx.flow_id,
                Some(node.id),
                format!("condition '{}' failed to evaluate", node.name),
            )
            .await;
        }
        Ok(Dispatched { node_failed, next })
    }

    async fn exec_request(
        &self,
        ctx: &mut RunCtx<'_>,
        node: &Node,
    ) -> Result<Dispatched, RunError> {
        let Some(spec) = ctx.input.http.get(&node.id) else {
            return self
                .finish_work_node(ctx, node, NodeOutcome::failure("http definition not loaded"))
                .await;
        };
        let input_ctx = ctx.scope.flatten();
        let mut execution = running_execution(node, input_ctx.clone());
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;

        let resolved = resolver::resolve(&spec.base, spec.delta.as_ref());
        let side = ctx.side.clone();
        let work = self.send_request(ctx.flow_id, node.id, resolved, input_ctx, side);
        let outcome = tokio::select! {
            _ = ctx.cancel.canceled() => {
                return self.cancel_node(ctx, &mut execution).await;
            }
            result = tokio::time::timeout(self.node_timeout, work) => match result {
                Ok(outcome) => outcome,
                Err(_) => NodeOutcome::failure(format!(
                    "request timed out after {} s",
                    self.node_timeout.as_secs()
                )),
            },
        };
        self.finish_work_node_with(ctx, node, execution, outcome, true).await
    }

    async fn exec_javascript(
        &self,
        ctx: &mut RunCtx<'_>,
        node: &Node,
    ) -> Result<Dispatched, RunError> {
        let Some(config) = ctx.input.configs.js.get(&node.id) else {
            return Ok(Dispatched::none());
        };
        let code = match config.compression_kind {
            CompressionKind::None => String::from_utf8_lossy(&config.code).into_owned(),
            CompressionKind::Zstd => {
                return self
                    .finish_work_node(
                        ctx,
                        node,
                        NodeOutcome::failure("zstd-compressed scripts are not supported"),
                    )
                    .await;
            }
        };
        let input_ctx = ctx.scope.flatten();
        let mut execution = running_execution(node, input_ctx.clone());
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;

        let work = async {
            match self.js.execute(&code, &input_ctx).await {
                Ok(value) => NodeOutcome::success(Some(value)),
                Err(error) => NodeOutcome::failure(error.to_string()),
            }
        };
        let outcome = tokio::select! {
            _ = ctx.cancel.canceled() => {
                return self.cancel_node(ctx, &mut execution).await;
            }
            result = tokio::time::timeout(self.node_timeout, work) => match result {
                Ok(outcome) => outcome,
                Err(_) => NodeOutcome::failure(format!(
                    "script timed out after {} s",
                    self.node_timeout.as_secs()
                )),
            },
        };
        self.finish_work_node_with(ctx, node, execution, outcome, false).await
    }

    async fn exec_loop(&self, ctx: &mut RunCtx<'_>, node: &Node) -> Result<Dispatched, RunError> {
        let plan = match node.kind {
            NodeKind::ForCount => {
                let Some(config) = ctx.input.configs.for_count.get(&node.id) else {
                    return Ok(Dispatched::none());
                };
                LoopPlan {
                    items: None,
                    count: config.iter_count.max(0) as usize,
                    condition_expr: config.condition_expr.clone(),
                    error_handling: config.error_handling,
                }
            }
            _ => {
                let Some(config) = ctx.input.configs.for_each.get(&node.id) else {
                    return Ok(Dispatched::none());
                };
                let iterable = crate::expr::evaluate(&config.iter_expr, &ctx.scope.flatten());
                let items = match iterable {
                    Ok(Value::Array(items)) => items,
                    Ok(Value::Object(map)) => map.into_values().collect(),
                    Ok(other) => {
                        return self
                            .finish_work_node(
                                ctx,
                                node,
                                NodeOutcome::failure(format!(
                                    "iteration expression produced {other}, expected an array or object",
                                )),
                            )
                            .await;
                    }
                    Err(error) => {
                        return self
                            .finish_work_node(ctx, node, NodeOutcome::failure(error.to_string()))
                            .await;
                    }
                };
                LoopPlan {
                    count: items.len(),
                    items: Some(items),
                    condition_expr: config.condition_expr.clone(),
                    error_handling: config.error_handling,
                }
            }
        };

        let mut execution = running_execution(node, ctx.scope.flatten());
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;

        let body = ctx.graph.successors(node.id, EdgeHandle::LoopBody);
        let mut outcome = NodeOutcome::success(Some(json!({ "iterations": 0 })));
        let mut completed = 0usize;
        for index in 0..plan.count {
            if ctx.cancel.is_canceled() {
                return self.cancel_node(ctx, &mut execution).await;
            }
            ctx.scope.push_frame();
            ctx.scope.bind("iteration_index", json!(index));
            if let Some(items) = &plan.items {
                ctx.scope.bind("item", items[index].clone());
            }
            if let Some(expr) = &plan.condition_expr {
                match evaluate_bool(expr, &ctx.scope.flatten()) {
                    Ok(true) => {}
                    Ok(false) => {
                        ctx.scope.pop_frame();
                        break;
                    }
                    Err(error) => {
                        ctx.scope.pop_frame();
                        outcome = NodeOutcome::failure(error.to_string());
                        break;
                    }
                }
            }
            // A canceled body must leave the loop's own execution
            // terminal before the cancellation propagates outward.
            let iteration_failed = match self.run_subgraph(&mut *ctx, body.clone()).await {
                Ok(failed) => failed,
                Err(RunError::Canceled) => {
                    ctx.scope.pop_frame();
                    return self.cancel_node(ctx, &mut execution).await;
                }
                Err(other) => {
                    ctx.scope.pop_frame();
                    return Err(other);
                }
            };
            ctx.scope.pop_frame();
            completed += 1;
            if iteration_failed && plan.error_handling != ErrorHandling::Ignore {
                outcome = NodeOutcome::failure(format!(
                    "loop body failed on iteration {index}"
                ));
                break;
            }
        }
        if outcome.success {
            outcome.output = Some(json!({ "iterations": completed }));
        }

        // Success exits on the loop_end handle; failure follows the
        // general else-handle rule.
        execution.completed_at = Some(Utc::now());
        let next = if outcome.success {
            execution.state = ExecutionState::Success;
            execution.output = outcome.output.clone();
            ctx.graph.successors(node.id, EdgeHandle::LoopEnd)
        } else {
            execution.state = ExecutionState::Failure;
            execution.error = outcome.error.clone();
            ctx.failed = true;
            ctx.graph.successors(node.id, EdgeHandle::Else)
        };
        let node_failed = !outcome.success;
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;
        Ok(Dispatched { node_failed, next })
    }

    /// Shared terminal handling for work nodes that already emitted
    /// `running`. Success dispatches on the unspecified handle,
    /// failure on `else`.
    async fn finish_work_node_with(
        &self,
        ctx: &mut RunCtx<'_>,
        node: &Node,
        mut execution: NodeExecution,
        outcome: NodeOutcome,
        bind_response: bool,
    ) -> Result<Dispatched, RunError> {
        execution.completed_at = Some(Utc::now());
        execution.output = outcome.output.clone();
        execution.response_id = outcome.response_id;
        let next = if outcome.success {
            execution.state = ExecutionState::Success;
            ctx.graph.successors(node.id, EdgeHandle::Unspecified)
        } else {
            execution.state = ExecutionState::Failure;
            execution.error = outcome.error.clone();
            ctx.graph.successors(node.id, EdgeHandle::Else)
        };
        self.sink
            .upsert_execution(ctx.flow_id, &execution)
            .await
            .map_err(RunError::sink)?;

        if outcome.success {
            if bind_response {
                if let Some(output) = outcome.output {
                    ctx.scope.bind_node_response(&node.name, output);
                }
            }
            Ok(Dispatched {
                node_failed: false,
                next,
            })
        } else {
            ctx.failed = true;
            let message = outcome.error.unwrap_or_else(|| "node failed".into());
            tracing::warn!(flow_id = %ctx.flow_id, node_id = %node.id, %message, "node failed");
            self.log(
                ctx.flow_id,
                Some(node.id),
                format!("node '{}' failed: {message}", node.name),
            )
            .await;
            Ok(Dispatched {
                node_failed: true,
                next,
            })
        }
    }

    /// Terminal handling for nodes that fail before emitting `running`.
    async fn finish_work_node(
        &self,
        ctx: &mut RunCtx<'_>,
        node: &Node,
        outcome: NodeOutcome,
    ) -> Result<Dispatched, RunError> {
        let execution = running_execution(node, ctx.scope.flatten());
        self.finish_work_node_with(ctx, node, execution, outcome, false)
            .await
    }

    async fn cancel_node(
        &self,
        ctx: &mut RunCtx<'_>,
        execution: &mut NodeExecution,
    ) -> Result<Dispatched, RunError> {
        execution.state = ExecutionState::Canceled;
        execution.completed_at = Some(Utc::now());
        self.sink
            .upsert_execution(ctx.flow_id, execution)
            .await
            .map_err(RunError::sink)?;
        Err(RunError::Canceled)
    }

    /// Issue the resolved request and hand the full response bundle to
    /// the side-channel, waiting for its ack so response events land
    /// before the node's terminal event.
    async fn send_request(
        &self,
        flow_id: Id,
        node_id: Id,
        resolved: ResolvedRequest,
        scope_ctx: Value,
        side: mpsc::Sender<ResponseArtifact>,
    ) -> NodeOutcome {
        let method = match reqwest::Method::from_bytes(resolved.method.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return NodeOutcome::failure(format!("invalid http method '{}'", resolved.method));
            }
        };
        let mut request = self.http.request(method, &resolved.url);
        if !resolved.queries.is_empty() {
            request = request.query(&resolved.queries);
        }
        for (key, value) in &resolved.headers {
            request = request.header(key, value);
        }
        request = match &resolved.body {
            ResolvedBody::None => request,
            ResolvedBody::Raw(bytes) => request.body(bytes.clone()),
            ResolvedBody::UrlEncoded(fields) => request.form(fields),
            ResolvedBody::Form(fields) => {
                let mut form = reqwest::multipart::Form::new();
                for (key, value) in fields {
                    form = form.text(key.clone(), value.clone());
                }
                request.multipart(form)
            }
        };

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => return NodeOutcome::failure(format!("http request failed: {error}")),
        };
        let status = response.status().as_u16();
        let response_id = Id::generate();
        let headers: Vec<ResponseHeader> = response
            .headers()
            .iter()
            .map(|(name, value)| ResponseHeader {
                id: Id::generate(),
                response_id,
                key: name.to_string(),
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
            .collect();
        let body = match response.bytes().await {
            Ok(body) => body.to_vec(),
            Err(error) => return NodeOutcome::failure(format!("failed to read body: {error}")),
        };
        let duration_ms = started.elapsed().as_millis() as i64;

        let body_value = serde_json::from_slice::<Value>(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
        let mut header_map = Map::new();
        for header in &headers {
            header_map.insert(header.key.clone(), Value::String(header.value.clone()));
        }
        let response_value = json!({
            "status": status,
            "headers": Value::Object(header_map.clone()),
            "body": body_value,
        });

        let mut assert_ctx = match scope_ctx {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        assert_ctx.insert("response".into(), response_value.clone());
        let assert_ctx = Value::Object(assert_ctx);

        let mut blocking_failure = None;
        let asserts: Vec<ResponseAssert> = resolved
            .asserts
            .iter()
            .map(|assert| {
                let passed = evaluate_bool(&assert.expr, &assert_ctx).unwrap_or(false);
                if !passed && assert.blocking && blocking_failure.is_none() {
                    blocking_failure = Some(assert.expr.clone());
                }
                ResponseAssert {
                    id: Id::generate(),
                    response_id,
                    expr: assert.expr.clone(),
                    result: if passed {
                        AssertResult::Passed
                    } else {
                        AssertResult::Failed
                    },
                }
            })
            .collect();
        let assert_summary: Vec<Value> = asserts
            .iter()
            .map(|assert| {
                json!({
                    "expr": assert.expr,
                    "passed": assert.result == AssertResult::Passed,
                })
            })
            .collect();

        let record = HttpResponse {
            id: response_id,
            request_node_id: node_id,
            status,
            body,
            duration_ms,
        };
        let (done_tx, done_rx) = oneshot::channel();
        let artifact = ResponseArtifact {
            flow_id,
            response: record,
            headers,
            asserts,
            done: done_tx,
        };
        if side.send(artifact).await.is_err() {
            return NodeOutcome::failure("execution side channel closed");
        }
        if done_rx.await.is_err() {
            return NodeOutcome::failure("response artifact was not persisted");
        }

        let output = json!({
            "status": status,
            "headers": Value::Object(header_map),
            "body": response_value["body"],
            "asserts": assert_summary,
        });
        match blocking_failure {
            Some(expr) => NodeOutcome {
                success: false,
                output: Some(output),
                error: Some(format!("blocking assertion failed: {expr}")),
                response_id: Some(response_id),
            },
            None => NodeOutcome {
                success: true,
                output: Some(output),
                error: None,
                response_id: Some(response_id),
            },
        }
    }

    async fn log(&self, flow_id: Id, node_id: Option<Id>, message: String) {
        let entry = LogEntry {
            flow_id,
            node_id,
            message,
            timestamp: Utc::now(),
        };
        if let Err(error) = self.sink.log(entry).await {
            tracing::debug!(%error, "run log entry dropped");
        }
    }
}

struct Dispatched {
    node_failed: bool,
    next: Vec<Id>,
}

impl Dispatched {
    fn none() -> Self {
        Self {
            node_failed: false,
            next: Vec::new(),
        }
    }
}

struct LoopPlan {
    /// `Some` for for_each; `None` iterates a bare counter.
    items: Option<Vec<Value>>,
    count: usize,
    condition_expr: Option<String>,
    error_handling: ErrorHandling,
}

fn running_execution(node: &Node, input: Value) -> NodeExecution {
    NodeExecution {
        id: Id::generate(),
        node_id: node.id,
        name: node.name.clone(),
        state: ExecutionState::Running,
        started_at: Utc::now(),
        completed_at: None,
        error: None,
        input: Some(input),
        output: None,
        response_id: None,
    }
}

/// Base scope frame: workspace env first, then enabled flow variables
/// in order so variables shadow env bindings. Variable values that
/// parse as JSON are bound typed; anything else stays a string.
fn base_scope(input: &RunInput) -> Map<String, Value> {
    let mut base = input.env.clone();
    let mut variables: Vec<&FlowVariable> =
        input.variables.iter().filter(|v| v.enabled).collect();
    variables.sort_by(|a, b| a.order.total_cmp(&b.order));
    for variable in variables {
        let value = serde_json::from_str::<Value>(&variable.value)
            .unwrap_or_else(|_| Value::String(variable.value.clone()));
        base.insert(variable.name.clone(), value);
    }
    base
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::js::MockJsExecutor;
    use crate::model::{EdgeKind, NodeState};
    use parking_lot::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ---- Recording sink -------------------------------------------------

    #[derive(Debug, Clone)]
    pub(crate) enum SinkEvent {
        FlowRunning(bool, Option<i64>),
        Execution(NodeExecution),
        Response(HttpResponse, usize, usize),
        Log(String),
    }

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        events: Mutex<Vec<SinkEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn events(&self) -> Vec<SinkEvent> {
            self.events.lock().clone()
        }

        pub(crate) fn executions(&self) -> Vec<NodeExecution> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SinkEvent::Execution(execution) => Some(execution),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn responses(&self) -> Vec<HttpResponse> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SinkEvent::Response(response, _, _) => Some(response),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl RunSink for RecordingSink {
        async fn flow_running(
            &self,
            _flow: &Flow,
            running: bool,
            duration_ms: Option<i64>,
        ) -> Result<(), SinkError> {
            self.events
                .lock()
                .push(SinkEvent::FlowRunning(running, duration_ms));
            Ok(())
        }

        async fn upsert_execution(
            &self,
            _flow_id: Id,
            execution: &NodeExecution,
        ) -> Result<(), SinkError> {
            self.events
                .lock()
                .push(SinkEvent::Execution(execution.clone()));
            Ok(())
        }

        async fn persist_response(
            &self,
            _flow_id: Id,
            response: &HttpResponse,
            headers: &[ResponseHeader],
            asserts: &[ResponseAssert],
        ) -> Result<(), SinkError> {
            self.events.lock().push(SinkEvent::Response(
                response.clone(),
                headers.len(),
                asserts.len(),
            ));
            Ok(())
        }

        async fn log(&self, entry: LogEntry) -> Result<(), SinkError> {
            self.events.lock().push(SinkEvent::Log(entry.message));
            Ok(())
        }
    }

    // ---- Fixtures -------------------------------------------------------

    fn flow() -> Flow {
        Flow {
            id: Id::generate(),
            workspace_id: Id::generate(),
            name: "test flow".into(),
            running: false,
            duration_ms: None,
            version_parent_id: None,
        }
    }

    fn node(flow_id: Id, name: &str, kind: NodeKind) -> Node {
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

    fn edge(flow_id: Id, source: Id, target: Id, handle: EdgeHandle) -> Edge {
        Edge {
            id: Id::generate(),
            flow_id,
            source_node_id: source,
            target_node_id: target,
            source_handle: handle,
            kind: EdgeKind::Unspecified,
        }
    }

    fn input(flow: Flow, nodes: Vec<Node>, edges: Vec<Edge>) -> RunInput {
        RunInput {
            flow,
            nodes,
            edges,
            variables: vec![],
            env: Map::new(),
            configs: NodeConfigs::default(),
            http: HashMap::new(),
        }
    }

    fn runner(sink: Arc<RecordingSink>) -> FlowRunner {
        FlowRunner::new(sink, Arc::new(MockJsExecutor::new()), reqwest::Client::new())
    }

    fn runner_with_js(sink: Arc<RecordingSink>, js: Arc<MockJsExecutor>) -> FlowRunner {
        FlowRunner::new(sink, js, reqwest::Client::new())
    }

    struct SlowExecutor;

    #[async_trait]
    impl JsExecutor for SlowExecutor {
        async fn execute(
            &self,
            _code: &str,
            _context: &Value,
        ) -> Result<Value, crate::js::JsError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Value::Null)
        }
    }

    // ---- Scheduler ------------------------------------------------------

    #[tokio::test]
    async fn start_only_flow_succeeds() {
        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let outcome = runner(sink.clone())
            .run(input(flow, vec![start.clone()], vec![]), CancelSignal::never())
            .await
            .unwrap();

        assert!(!outcome.failed);
        let executions = sink.executions();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].node_id, start.id);
        assert_eq!(executions[0].state, ExecutionState::Success);

        let events = sink.events();
        assert!(matches!(events.first(), Some(SinkEvent::FlowRunning(true, None))));
        assert!(events
            .iter()
            .any(|e| matches!(e, SinkEvent::FlowRunning(false, Some(_)))));
    }

    #[tokio::test]
    async fn condition_dispatches_then_branch() {
        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let cond = node(flow.id, "Check", NodeKind::Condition);
        let then_node = node(flow.id, "Then", NodeKind::NoOp);
        let else_node = node(flow.id, "Else", NodeKind::NoOp);
        let edges = vec![
            edge(flow.id, start.id, cond.id, EdgeHandle::Unspecified),
            edge(flow.id, cond.id, then_node.id, EdgeHandle::Then),
            edge(flow.id, cond.id, else_node.id, EdgeHandle::Else),
        ];
        let mut input = input(
            flow,
            vec![start, cond.clone(), then_node.clone(), else_node.clone()],
            edges,
        );
        input.configs.condition.insert(
            cond.id,
            NodeCondition {
                node_id: cond.id,
                expr: "flag == true".into(),
            },
        );
        input.variables.push(FlowVariable {
            id: Id::generate(),
            flow_id: input.flow.id,
            name: "flag".into(),
            value: "true".into(),
            enabled: true,
            description: String::new(),
            order: 1.0,
        });

        let outcome = runner(sink.clone())
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(!outcome.failed);

        let executed: Vec<Id> = sink.executions().iter().map(|e| e.node_id).collect();
        assert!(executed.contains(&then_node.id));
        assert!(!executed.contains(&else_node.id));
    }

    #[tokio::test]
    async fn for_count_runs_body_per_iteration_with_fresh_execution_ids() {
        let sink = Arc::new(RecordingSink::default());
        let js = Arc::new(MockJsExecutor::new());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let loop_node = node(flow.id, "Loop", NodeKind::ForCount);
        let body = node(flow.id, "Body", NodeKind::Javascript);
        let after = node(flow.id, "After", NodeKind::NoOp);
        let edges = vec![
            edge(flow.id, start.id, loop_node.id, EdgeHandle::Unspecified),
            edge(flow.id, loop_node.id, body.id, EdgeHandle::LoopBody),
            edge(flow.id, loop_node.id, after.id, EdgeHandle::LoopEnd),
        ];
        let mut input = input(
            flow,
            vec![start, loop_node.clone(), body.clone(), after.clone()],
            edges,
        );
        input.configs.for_count.insert(
            loop_node.id,
            NodeFor {
                node_id: loop_node.id,
                iter_count: 3,
                condition_expr: None,
                error_handling: ErrorHandling::Unspecified,
            },
        );
        input.configs.js.insert(
            body.id,
            NodeJs {
                node_id: body.id,
                code: b"1".to_vec(),
                compression_kind: CompressionKind::None,
            },
        );

        let outcome = runner_with_js(sink.clone(), js.clone())
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(!outcome.failed);

        // Each iteration saw its own index.
        let calls = js.calls();
        assert_eq!(calls.len(), 3);
        for (index, (_, ctx)) in calls.iter().enumerate() {
            assert_eq!(ctx["iteration_index"], json!(index));
        }

        // One execution id per body invocation, all distinct.
        let body_ids: std::collections::HashSet<Id> = sink
            .executions()
            .iter()
            .filter(|e| e.node_id == body.id)
            .map(|e| e.id)
            .collect();
        assert_eq!(body_ids.len(), 3);

        // Loop exits through loop_end.
        assert!(sink.executions().iter().any(|e| e.node_id == after.id));
    }

    #[tokio::test]
    async fn response_bound_in_loop_visible_after_loop_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let loop_node = node(flow.id, "Loop", NodeKind::ForCount);
        let ping = node(flow.id, "Ping", NodeKind::HttpRequest);
        let check = node(flow.id, "Check", NodeKind::Condition);
        let then_node = node(flow.id, "Then", NodeKind::NoOp);
        let else_node = node(flow.id, "Else", NodeKind::NoOp);
        let edges = vec![
            edge(flow.id, start.id, loop_node.id, EdgeHandle::Unspecified),
            edge(flow.id, loop_node.id, ping.id, EdgeHandle::LoopBody),
            edge(flow.id, loop_node.id, check.id, EdgeHandle::LoopEnd),
            edge(flow.id, check.id, then_node.id, EdgeHandle::Then),
            edge(flow.id, check.id, else_node.id, EdgeHandle::Else),
        ];
        let mut input = input(
            flow,
            vec![
                start,
                loop_node.clone(),
                ping.clone(),
                check.clone(),
                then_node.clone(),
                else_node.clone(),
            ],
            edges,
        );
        input.configs.for_count.insert(
            loop_node.id,
            NodeFor {
                node_id: loop_node.id,
                iter_count: 1,
                condition_expr: None,
                error_handling: ErrorHandling::Unspecified,
            },
        );
        input.configs.condition.insert(
            check.id,
            NodeCondition {
                node_id: check.id,
                expr: "nodes.Ping.response.status == 200".into(),
            },
        );
        input.configs.http.insert(
            ping.id,
            NodeHttp {
                node_id: ping.id,
                http_id: Id::generate(),
                delta_http_id: None,
                has_request_config: true,
            },
        );
        input.http.insert(
            ping.id,
            HttpSpec {
                base: HttpBundle {
                    definition: crate::model::HttpDefinition {
                        id: Id::generate(),
                        workspace_id: input.flow.workspace_id,
                        method: "GET".into(),
                        url: format!("{}/ping", server.uri()),
                        body_kind: crate::model::BodyKind::None,
                        body_raw: None,
                        parent_id: None,
                        method_override: None,
                        url_override: None,
                    },
                    headers: vec![],
                    queries: vec![],
                    body: crate::model::HttpBody::default(),
                    asserts: vec![],
                },
                delta: None,
            },
        );

        let outcome = runner(sink.clone())
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(!outcome.failed);

        // The response from inside the loop body stays addressable by
        // node name once the loop has exited through loop_end.
        let executed: Vec<Id> = sink.executions().iter().map(|e| e.node_id).collect();
        assert!(executed.contains(&then_node.id));
        assert!(!executed.contains(&else_node.id));
    }

    #[tokio::test]
    async fn response_events_precede_terminal_execution() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pong": true})))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let request = node(flow.id, "Ping", NodeKind::HttpRequest);
        let edges = vec![edge(flow.id, start.id, request.id, EdgeHandle::Unspecified)];
        let mut input = input(flow, vec![start, request.clone()], edges);
        input.configs.http.insert(
            request.id,
            NodeHttp {
                node_id: request.id,
                http_id: Id::generate(),
                delta_http_id: None,
                has_request_config: true,
            },
        );
        let definition = crate::model::HttpDefinition {
            id: Id::generate(),
            workspace_id: input.flow.workspace_id,
            method: "GET".into(),
            url: format!("{}/ping", server.uri()),
            body_kind: crate::model::BodyKind::None,
            body_raw: None,
            parent_id: None,
            method_override: None,
            url_override: None,
        };
        let asserts = vec![crate::model::HttpAssert {
            id: Id::generate(),
            http_id: definition.id,
            expr: "response.status == 200".into(),
            enabled: true,
            blocking: true,
        }];
        input.http.insert(
            request.id,
            HttpSpec {
                base: HttpBundle {
                    definition,
                    headers: vec![],
                    queries: vec![],
                    body: crate::model::HttpBody::default(),
                    asserts,
                },
                delta: None,
            },
        );

        let outcome = runner(sink.clone())
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(!outcome.failed);

        // running → response(with assert) → success, in that order.
        let events = sink.events();
        let running_at = events
            .iter()
            .position(|e| {
                matches!(e, SinkEvent::Execution(x) if x.node_id == request.id && x.state == ExecutionState::Running)
            })
            .unwrap();
        let response_at = events
            .iter()
            .position(|e| matches!(e, SinkEvent::Response(r, _, asserts) if r.status == 200 && *asserts == 1))
            .unwrap();
        let success_at = events
            .iter()
            .position(|e| {
                matches!(e, SinkEvent::Execution(x) if x.node_id == request.id && x.state == ExecutionState::Success)
            })
            .unwrap();
        assert!(running_at < response_at);
        assert!(response_at < success_at);

        // Stable execution id across running and success.
        let request_execs: Vec<NodeExecution> = sink
            .executions()
            .into_iter()
            .filter(|e| e.node_id == request.id)
            .collect();
        assert_eq!(request_execs.len(), 2);
        assert_eq!(request_execs[0].id, request_execs[1].id);
        assert_eq!(
            request_execs[1].response_id,
            Some(sink.responses()[0].id)
        );
    }

    #[tokio::test]
    async fn delta_override_changes_method_and_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("X-Test", "Delta"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let request = node(flow.id, "Request", NodeKind::HttpRequest);
        let edges = vec![edge(flow.id, start.id, request.id, EdgeHandle::Unspecified)];
        let mut input = input(flow, vec![start, request.clone()], edges);

        let base_def = crate::model::HttpDefinition {
            id: Id::generate(),
            workspace_id: input.flow.workspace_id,
            method: "GET".into(),
            url: format!("{}/", server.uri()),
            body_kind: crate::model::BodyKind::None,
            body_raw: None,
            parent_id: None,
            method_override: None,
            url_override: None,
        };
        let base_header = crate::model::HttpHeader {
            id: Id::generate(),
            http_id: base_def.id,
            key: "X-Test".into(),
            value: "Base".into(),
            enabled: true,
            is_delta: false,
            parent_id: None,
            value_override: None,
        };
        let delta_def = crate::model::HttpDefinition {
            id: Id::generate(),
            workspace_id: input.flow.workspace_id,
            method: String::new(),
            url: String::new(),
            body_kind: crate::model::BodyKind::None,
            body_raw: None,
            parent_id: Some(base_def.id),
            method_override: Some("POST".into()),
            url_override: None,
        };
        let delta_header = crate::model::HttpHeader {
            id: Id::generate(),
            http_id: delta_def.id,
            key: "X-Test".into(),
            value: String::new(),
            enabled: true,
            is_delta: true,
            parent_id: Some(base_header.id),
            value_override: Some("Delta".into()),
        };

        input.configs.http.insert(
            request.id,
            NodeHttp {
                node_id: request.id,
                http_id: base_def.id,
                delta_http_id: Some(delta_def.id),
                has_request_config: true,
            },
        );
        input.http.insert(
            request.id,
            HttpSpec {
                base: HttpBundle {
                    definition: base_def,
                    headers: vec![base_header],
                    queries: vec![],
                    body: crate::model::HttpBody::default(),
                    asserts: vec![],
                },
                delta: Some(HttpBundle {
                    definition: delta_def,
                    headers: vec![delta_header],
                    queries: vec![],
                    body: crate::model::HttpBody::default(),
                    asserts: vec![],
                }),
            },
        );

        let outcome = runner(sink.clone())
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(!outcome.failed);
        // MockServer::expect(1) verifies the POST + Delta header on drop.
    }

    #[tokio::test]
    async fn failing_node_dispatches_else_and_marks_run_failed() {
        let sink = Arc::new(RecordingSink::default());
        let js = Arc::new(MockJsExecutor::new());
        js.push_err("boom");

        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let script = node(flow.id, "Script", NodeKind::Javascript);
        let recovery = node(flow.id, "Recovery", NodeKind::NoOp);
        let edges = vec![
            edge(flow.id, start.id, script.id, EdgeHandle::Unspecified),
            edge(flow.id, script.id, recovery.id, EdgeHandle::Else),
        ];
        let mut input = input(flow, vec![start, script.clone(), recovery.clone()], edges);
        input.configs.js.insert(
            script.id,
            NodeJs {
                node_id: script.id,
                code: b"boom()".to_vec(),
                compression_kind: CompressionKind::None,
            },
        );

        let outcome = runner_with_js(sink.clone(), js)
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(outcome.failed);

        let executions = sink.executions();
        let script_exec = executions
            .iter()
            .rfind(|e| e.node_id == script.id)
            .unwrap();
        assert_eq!(script_exec.state, ExecutionState::Failure);
        assert!(script_exec.error.as_deref().unwrap_or_default().contains("boom"));
        assert!(executions.iter().any(|e| e.node_id == recovery.id));
    }

    #[tokio::test]
    async fn cancellation_marks_in_flight_node_canceled() {
        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let script = node(flow.id, "Slow", NodeKind::Javascript);
        let edges = vec![edge(flow.id, start.id, script.id, EdgeHandle::Unspecified)];
        let mut input = input(flow, vec![start, script.clone()], edges);
        input.configs.js.insert(
            script.id,
            NodeJs {
                node_id: script.id,
                code: b"sleep()".to_vec(),
                compression_kind: CompressionKind::None,
            },
        );

        let (cancel_tx, signal) = CancelSignal::test_pair();
        let runner = FlowRunner::new(sink.clone(), Arc::new(SlowExecutor), reqwest::Client::new());
        let handle = tokio::spawn(async move { runner.run(input, signal).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RunError::Canceled)));

        let script_exec = sink
            .executions()
            .into_iter()
            .filter(|e| e.node_id == script.id)
            .next_back()
            .unwrap();
        assert_eq!(script_exec.state, ExecutionState::Canceled);

        // Flow still unmarked after cancellation.
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, SinkEvent::FlowRunning(false, Some(_)))));
    }

    #[tokio::test]
    async fn cancellation_inside_loop_body_cancels_the_loop_node_too() {
        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let loop_node = node(flow.id, "Loop", NodeKind::ForCount);
        let body = node(flow.id, "Slow", NodeKind::Javascript);
        let edges = vec![
            edge(flow.id, start.id, loop_node.id, EdgeHandle::Unspecified),
            edge(flow.id, loop_node.id, body.id, EdgeHandle::LoopBody),
        ];
        let mut input = input(flow, vec![start, loop_node.clone(), body.clone()], edges);
        input.configs.for_count.insert(
            loop_node.id,
            NodeFor {
                node_id: loop_node.id,
                iter_count: 3,
                condition_expr: None,
                error_handling: ErrorHandling::Unspecified,
            },
        );
        input.configs.js.insert(
            body.id,
            NodeJs {
                node_id: body.id,
                code: b"sleep()".to_vec(),
                compression_kind: CompressionKind::None,
            },
        );

        let (cancel_tx, signal) = CancelSignal::test_pair();
        let runner = FlowRunner::new(sink.clone(), Arc::new(SlowExecutor), reqwest::Client::new());
        let handle = tokio::spawn(async move { runner.run(input, signal).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RunError::Canceled)));

        // Both the in-flight body and the enclosing loop end terminal.
        let executions = sink.executions();
        let body_exec = executions
            .iter()
            .rfind(|e| e.node_id == body.id)
            .unwrap();
        assert_eq!(body_exec.state, ExecutionState::Canceled);
        let loop_exec = executions
            .iter()
            .rfind(|e| e.node_id == loop_node.id)
            .unwrap();
        assert_eq!(loop_exec.state, ExecutionState::Canceled);
        assert!(loop_exec.completed_at.is_some());
    }

    #[tokio::test]
    async fn node_timeout_fails_the_node_not_the_run() {
        let sink = Arc::new(RecordingSink::default());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let script = node(flow.id, "Slow", NodeKind::Javascript);
        let edges = vec![edge(flow.id, start.id, script.id, EdgeHandle::Unspecified)];
        let mut input = input(flow, vec![start, script.clone()], edges);
        input.configs.js.insert(
            script.id,
            NodeJs {
                node_id: script.id,
                code: b"sleep()".to_vec(),
                compression_kind: CompressionKind::None,
            },
        );

        let runner =
            FlowRunner::new(sink.clone(), Arc::new(SlowExecutor), reqwest::Client::new())
                .with_node_timeout(Duration::from_millis(50));
        let outcome = runner.run(input, CancelSignal::never()).await.unwrap();
        assert!(outcome.failed);

        let script_exec = sink
            .executions()
            .into_iter()
            .filter(|e| e.node_id == script.id)
            .next_back()
            .unwrap();
        assert_eq!(script_exec.state, ExecutionState::Failure);
        assert!(script_exec
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn zero_iterations_skips_body_and_exits_loop_end() {
        let sink = Arc::new(RecordingSink::default());
        let js = Arc::new(MockJsExecutor::new());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let loop_node = node(flow.id, "Loop", NodeKind::ForCount);
        let body = node(flow.id, "Body", NodeKind::Javascript);
        let after = node(flow.id, "After", NodeKind::NoOp);
        let edges = vec![
            edge(flow.id, start.id, loop_node.id, EdgeHandle::Unspecified),
            edge(flow.id, loop_node.id, body.id, EdgeHandle::LoopBody),
            edge(flow.id, loop_node.id, after.id, EdgeHandle::LoopEnd),
        ];
        let mut input = input(
            flow,
            vec![start, loop_node.clone(), body.clone(), after.clone()],
            edges,
        );
        input.configs.for_count.insert(
            loop_node.id,
            NodeFor {
                node_id: loop_node.id,
                iter_count: 0,
                condition_expr: None,
                error_handling: ErrorHandling::Unspecified,
            },
        );
        input.configs.js.insert(
            body.id,
            NodeJs {
                node_id: body.id,
                code: b"1".to_vec(),
                compression_kind: CompressionKind::None,
            },
        );

        let outcome = runner_with_js(sink.clone(), js.clone())
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(!outcome.failed);
        assert!(js.calls().is_empty());
        assert!(sink.executions().iter().any(|e| e.node_id == after.id));
    }

    #[tokio::test]
    async fn for_each_binds_items() {
        let sink = Arc::new(RecordingSink::default());
        let js = Arc::new(MockJsExecutor::new());
        let flow = flow();
        let start = node(flow.id, "Start", NodeKind::Start);
        let loop_node = node(flow.id, "Each", NodeKind::ForEach);
        let body = node(flow.id, "Body", NodeKind::Javascript);
        let edges = vec![
            edge(flow.id, start.id, loop_node.id, EdgeHandle::Unspecified),
            edge(flow.id, loop_node.id, body.id, EdgeHandle::LoopBody),
        ];
        let mut input = input(flow, vec![start, loop_node.clone(), body.clone()], edges);
        input.configs.for_each.insert(
            loop_node.id,
            NodeForEach {
                node_id: loop_node.id,
                iter_expr: "targets".into(),
                condition_expr: None,
                error_handling: ErrorHandling::Ignore,
            },
        );
        input.configs.js.insert(
            body.id,
            NodeJs {
                node_id: body.id,
                code: b"item".to_vec(),
                compression_kind: CompressionKind::None,
            },
        );
        input.variables.push(FlowVariable {
            id: Id::generate(),
            flow_id: input.flow.id,
            name: "targets".into(),
            value: r#"["a","b"]"#.into(),
            enabled: true,
            description: String::new(),
            order: 1.0,
        });

        let outcome = runner_with_js(sink.clone(), js.clone())
            .run(input, CancelSignal::never())
            .await
            .unwrap();
        assert!(!outcome.failed);

        let calls = js.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1["item"], json!("a"));
        assert_eq!(calls[1].1["item"], json!("b"));
    }
}
