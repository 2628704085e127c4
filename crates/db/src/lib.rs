//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for tenants, branches and branch grants
//! - `BranchGrantRepository`, the database-backed grant lookup
//! - `StoredProcedureSource`, the tenant-schema report data source
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{BranchGrantRepository, StoredProcedureSource};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use vitrine_shared::config::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection using the configured pool sizes.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
