//! Database migration runner for Vitrine.
//!
//! Creates the tenant, branch and branch-grant tables. Tenant report
//! procedures live in tenant schemas and are not managed here.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status

use sea_orm_migration::prelude::*;
use vitrine_db::migration::Migrator;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The migrator CLI sets up its own tracing
    cli::run_cli(Migrator).await;
}
