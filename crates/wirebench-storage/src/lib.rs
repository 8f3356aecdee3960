//! Storage layer for the wirebench API workbench.
//!
//! SeaORM entities, migrations, and store functions for the authoring
//! tables (workspace, flow, node, edge, variable, sub-configs, HTTP
//! definitions) and the run-time tables (responses, executions).
//!
//! The database is single-writer SQLite. Store functions are generic
//! over [`sea_orm::ConnectionTrait`] so the same code runs against the
//! pooled connection for reads and inside a [`txn::ChangeTxn`] for
//! writes. Callers validate before opening a transaction; a write
//! transaction performs writes only.

pub mod migrations;
pub mod models;
pub mod stores;
pub mod txn;

pub use txn::ChangeTxn;

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use wirebench_engine::id::IdError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbErr),

    /// A persisted id column held bytes that are not a valid id.
    #[error("corrupt id in storage: {source}")]
    CorruptId {
        #[from]
        source: IdError,
    },

    #[error("{entity} not found")]
    NotFound { entity: &'static str },
}

/// Connect to the database named by the URL, e.g.
/// `sqlite::memory:` or `sqlite://wirebench.db?mode=rwc`.
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(url).await
}

/// Bring the schema up to date.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrations::Migrator::up(db, None).await
}

#[cfg(test)]
pub(crate) async fn test_db() -> DatabaseConnection {
    let db = connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}
