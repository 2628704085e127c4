//! Stored-procedure report source.
//!
//! Each tenant keeps its report procedures in its own schema. Every call
//! covers exactly one branch and one period, and returns one JSON object per
//! procedure row.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, Statement,
};
use serde_json::Value;
use tracing::{debug, warn};
use vitrine_core::reports::{ReportSource, SourceError, SourceRequest};
use vitrine_shared::types::{BranchId, TenantId};

use crate::entities::{branches, tenants};

/// Default capacity of the tenant schema cache.
const SCHEMA_CACHE_CAPACITY: u64 = 1_000;

/// One procedure row, converted to JSON by the database.
#[derive(Debug, FromQueryResult)]
struct ProcedureRow {
    payload: Value,
}

/// Report source backed by tenant-schema stored procedures.
#[derive(Clone)]
pub struct StoredProcedureSource {
    db: DatabaseConnection,
    schemas: Cache<TenantId, Arc<str>>,
}

impl std::fmt::Debug for StoredProcedureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredProcedureSource")
            .field("cached_schemas", &self.schemas.entry_count())
            .finish_non_exhaustive()
    }
}

impl StoredProcedureSource {
    /// Creates a source whose tenant schema lookups live for `schema_ttl`.
    #[must_use]
    pub fn new(db: DatabaseConnection, schema_ttl: Duration) -> Self {
        let schemas = Cache::builder()
            .max_capacity(SCHEMA_CACHE_CAPACITY)
            .time_to_live(schema_ttl)
            .build();

        Self { db, schemas }
    }

    /// Returns the validated schema of an active tenant, cached.
    async fn schema(&self, tenant: TenantId) -> Result<Arc<str>, SourceError> {
        self.schemas
            .try_get_with(tenant, self.load_schema(tenant))
            .await
            .map_err(|e| unshare(&e))
    }

    async fn load_schema(&self, tenant: TenantId) -> Result<Arc<str>, SourceError> {
        debug!(tenant = %tenant, "Loading tenant schema");

        let model = tenants::Entity::find_by_id(tenant.into_inner())
            .one(&self.db)
            .await
            .map_err(|e| classify(&e))?
            .filter(|t| t.is_active)
            .ok_or(SourceError::UnknownTenant(tenant))?;

        validate_identifier(&model.schema_name)?;
        Ok(Arc::from(model.schema_name))
    }
}

#[async_trait]
impl ReportSource for StoredProcedureSource {
    async fn fetch_rows(&self, request: SourceRequest<'_>) -> Result<Vec<Value>, SourceError> {
        let schema = self.schema(request.tenant).await?;
        let sql = procedure_call_sql(&schema, request.dataset.procedure())?;

        let values: Vec<sea_orm::Value> = vec![
            request.branch.as_str().into(),
            request.period.start.into(),
            request.period.end.into(),
            request.params.clone().into(),
        ];
        let statement = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        let rows = ProcedureRow::find_by_statement(statement)
            .all(&self.db)
            .await
            .map_err(|e| classify(&e))?;

        debug!(
            dataset = %request.dataset,
            branch = %request.branch,
            period = %request.period.tag,
            rows = rows.len(),
            "Procedure returned"
        );
        Ok(rows.into_iter().map(|row| row.payload).collect())
    }

    async fn list_branches(&self, tenant: TenantId) -> Result<Vec<BranchId>, SourceError> {
        // Unknown or inactive tenants fail here rather than listing nothing.
        self.schema(tenant).await?;

        let rows = branches::Entity::find()
            .filter(branches::Column::TenantId.eq(tenant.into_inner()))
            .filter(branches::Column::IsActive.eq(true))
            .order_by_asc(branches::Column::Code)
            .all(&self.db)
            .await
            .map_err(|e| classify(&e))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.code.parse::<BranchId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(tenant = %tenant, code = %row.code, "Skipping branch with invalid code");
                    None
                }
            })
            .collect())
    }
}

// ============================================================================
// SQL helpers
// ============================================================================

/// Checks that `name` is a plain lowercase SQL identifier (`[a-z_][a-z0-9_]*`).
///
/// # Errors
///
/// Returns `SourceError::Query` for anything else.
pub fn validate_identifier(name: &str) -> Result<(), SourceError> {
    let mut chars = name.chars();
    let valid = name.len() <= 63
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(SourceError::Query(format!("invalid identifier: {name:?}")))
    }
}

/// Builds the call of one report procedure.
///
/// Parameters are branch code, period start, period end and dataset
/// parameters, bound as `$1..$4`.
///
/// # Errors
///
/// Returns `SourceError::Query` when either identifier is not valid.
pub fn procedure_call_sql(schema: &str, procedure: &str) -> Result<String, SourceError> {
    validate_identifier(schema)?;
    validate_identifier(procedure)?;
    Ok(format!(
        "SELECT to_jsonb(r) AS payload FROM \"{schema}\".\"{procedure}\"($1::text, $2::date, $3::date, $4::jsonb) AS r"
    ))
}

fn classify(err: &DbErr) -> SourceError {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => SourceError::Unavailable(err.to_string()),
        _ => SourceError::Query(err.to_string()),
    }
}

/// Rebuilds an error shared by the cache between concurrent lookups.
fn unshare(err: &SourceError) -> SourceError {
    match err {
        SourceError::Unavailable(message) => SourceError::Unavailable(message.clone()),
        SourceError::Query(message) => SourceError::Query(message.clone()),
        SourceError::UnknownTenant(tenant) => SourceError::UnknownTenant(*tenant),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use sea_orm::RuntimeErr;

    #[rstest]
    #[case("loja_centro")]
    #[case("_tenant")]
    #[case("t1")]
    #[case("rpt_perdas")]
    fn test_valid_identifiers(#[case] name: &str) {
        assert!(validate_identifier(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("1tenant")]
    #[case("Tenant")]
    #[case("tenant\"; drop table tenants; --")]
    #[case("public.rpt")]
    #[case("loja-centro")]
    fn test_invalid_identifiers(#[case] name: &str) {
        assert!(matches!(
            validate_identifier(name),
            Err(SourceError::Query(_))
        ));
    }

    #[test]
    fn test_identifier_length_limit() {
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_procedure_call_sql() {
        let sql = procedure_call_sql("loja_centro", "rpt_perdas").unwrap();
        assert_eq!(
            sql,
            "SELECT to_jsonb(r) AS payload FROM \"loja_centro\".\"rpt_perdas\"($1::text, $2::date, $3::date, $4::jsonb) AS r"
        );
    }

    #[test]
    fn test_procedure_call_sql_rejects_bad_schema() {
        assert!(procedure_call_sql("x\".\"y", "rpt_perdas").is_err());
    }

    #[test]
    fn test_connection_errors_are_unavailable() {
        let err = DbErr::Conn(RuntimeErr::Internal("refused".to_string()));
        assert!(matches!(classify(&err), SourceError::Unavailable(_)));

        let err = DbErr::Custom("function does not exist".to_string());
        assert!(matches!(classify(&err), SourceError::Query(_)));
    }

    #[test]
    fn test_unshare_keeps_variant() {
        let tenant = TenantId::new();
        assert!(matches!(
            unshare(&SourceError::UnknownTenant(tenant)),
            SourceError::UnknownTenant(t) if t == tenant
        ));
    }

    proptest! {
        /// Feature: stored-procedure source, Property: accepted identifiers never need escaping.
        #[test]
        fn prop_accepted_identifiers_are_plain(name in "\\PC{0,20}") {
            if validate_identifier(&name).is_ok() {
                prop_assert!(!name.is_empty());
                prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
                prop_assert!(!name.starts_with(|c: char| c.is_ascii_digit()));
            }
        }
    }
}
