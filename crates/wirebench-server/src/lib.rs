//! Service surface for the wirebench API workbench.
//!
//! Authoring CRUD (bulk, all-or-nothing), sync streams (snapshot⊕tail
//! per family), flow run/stop/duplicate, and the workspace access
//! gate. Wire marshalling lives outside this crate: every operation
//! takes a [`access::Caller`] plus plain DTOs and returns
//! [`rpc::RpcError`] with a framework-style code.
//!
//! All process-lifetime state (database pool, event hub, run registry,
//! pooled HTTP client, JS executor) is carried by [`AppState`] and
//! passed explicitly. No ambient globals.

pub mod access;
pub mod config;
pub mod rpc;
pub mod run;
pub mod services;
pub mod sync;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use wirebench_engine::js::JsExecutor;
use wirebench_engine::runner::RunRegistry;
use wirebench_engine::EventHub;

pub use config::Config;
pub use rpc::{Code, RpcError};

/// Everything the services need, constructed once at startup.
pub struct AppState {
    pub db: DatabaseConnection,
    pub hub: Arc<EventHub>,
    pub registry: Arc<RunRegistry>,
    pub http: reqwest::Client,
    pub js: Arc<dyn JsExecutor>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, js: Arc<dyn JsExecutor>) -> Self {
        Self {
            db,
            hub: Arc::new(EventHub::new()),
            registry: Arc::new(RunRegistry::new()),
            http: reqwest::Client::new(),
            js,
        }
    }
}
