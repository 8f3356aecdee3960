//! Startup configuration, read once from the environment.

use std::path::PathBuf;

use wirebench_engine::js::WORKER_SOCKET_ENV;

pub const DB_URL_ENV: &str = "WIREBENCH_DB_URL";

#[derive(Debug, Clone)]
pub struct Config {
    /// SeaORM connection URL. Defaults to an in-memory database.
    pub db_url: String,
    /// Unix socket of the external JS worker, when one is deployed.
    pub worker_socket: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let db_url = std::env::var(DB_URL_ENV).unwrap_or_else(|_| "sqlite::memory:".to_string());
        let worker_socket = std::env::var(WORKER_SOCKET_ENV).ok().map(PathBuf::from);
        Self {
            db_url,
            worker_socket,
        }
    }
}
