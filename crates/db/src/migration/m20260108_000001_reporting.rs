//! Reporting tables migration.
//!
//! Creates the tenant registry, the branch directory and the per-user branch
//! grants read by the authorization resolver.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(REPORTING_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS user_branch_grants CASCADE;
             DROP TABLE IF EXISTS branches CASCADE;
             DROP TABLE IF EXISTS tenants CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const REPORTING_SQL: &str = r"
-- Tenants and the schema holding their report procedures
CREATE TABLE tenants (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    schema_name VARCHAR(63) NOT NULL UNIQUE,
    is_active BOOLEAN NOT NULL DEFAULT true,
    CONSTRAINT chk_schema_name CHECK (schema_name ~ '^[a-z_][a-z0-9_]*$')
);

-- Branch directory, used when a request does not name branches
CREATE TABLE branches (
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    code VARCHAR(32) NOT NULL,
    name VARCHAR(255) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    PRIMARY KEY (tenant_id, code),
    CONSTRAINT chk_branch_code CHECK (code ~ '^[A-Za-z0-9_-]+$')
);

CREATE INDEX idx_branches_active ON branches(tenant_id, code) WHERE is_active;

-- Branch grants; a user with no rows here may see every branch.
-- Removing a grant must be explicit: a branch with grants cannot be deleted,
-- only deactivated.
CREATE TABLE user_branch_grants (
    user_id UUID NOT NULL,
    tenant_id UUID NOT NULL,
    branch_code VARCHAR(32) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (user_id, tenant_id, branch_code),
    FOREIGN KEY (tenant_id, branch_code) REFERENCES branches(tenant_id, code) ON DELETE RESTRICT
);

CREATE INDEX idx_user_branch_grants_lookup ON user_branch_grants(tenant_id, user_id);
";

#[cfg(test)]
mod tests {
    use super::REPORTING_SQL;

    fn grants_table() -> &'static str {
        let start = REPORTING_SQL
            .find("CREATE TABLE user_branch_grants")
            .unwrap();
        let end = REPORTING_SQL[start..].find(");").unwrap();
        &REPORTING_SQL[start..start + end]
    }

    #[test]
    fn test_branch_deletion_never_drops_grants() {
        let table = grants_table();
        assert!(table.contains("REFERENCES branches(tenant_id, code) ON DELETE RESTRICT"));
        assert!(!table.contains("CASCADE"));
    }
}
