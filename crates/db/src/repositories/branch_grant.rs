//! Branch grant repository.
//!
//! Backs the authorization resolver with the `user_branch_grants` table.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tracing::warn;
use vitrine_core::branch::{BranchGrantSource, GrantLookupError};
use vitrine_shared::types::{BranchId, TenantId, UserId};

use crate::entities::user_branch_grants;

/// Repository for per-user branch grants.
#[derive(Debug, Clone)]
pub struct BranchGrantRepository {
    db: DatabaseConnection,
}

impl BranchGrantRepository {
    /// Creates a new branch grant repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists the raw grant rows of a user within a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_for_user(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<Vec<user_branch_grants::Model>, DbErr> {
        user_branch_grants::Entity::find()
            .filter(user_branch_grants::Column::TenantId.eq(tenant.into_inner()))
            .filter(user_branch_grants::Column::UserId.eq(user.into_inner()))
            .order_by_asc(user_branch_grants::Column::BranchCode)
            .all(&self.db)
            .await
    }
}

#[async_trait]
impl BranchGrantSource for BranchGrantRepository {
    async fn branch_grants(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<Vec<BranchId>, GrantLookupError> {
        let rows = self
            .find_for_user(tenant, user)
            .await
            .map_err(|e| GrantLookupError(e.to_string()))?;

        grant_codes(rows.into_iter().map(|row| row.branch_code))
    }
}

/// Parses stored grant codes.
///
/// A code that cannot be parsed fails the lookup instead of being skipped:
/// dropping every grant would widen the caller's scope to all branches.
fn grant_codes(codes: impl IntoIterator<Item = String>) -> Result<Vec<BranchId>, GrantLookupError> {
    codes
        .into_iter()
        .map(|code| {
            code.parse::<BranchId>().map_err(|e| {
                warn!(code = %code, "Stored branch grant has an invalid code");
                GrantLookupError(e.to_string())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_codes_parse_in_order() {
        let codes = grant_codes(vec!["10".to_string(), "20".to_string()]).unwrap();
        let expected: Vec<BranchId> = vec!["10".parse().unwrap(), "20".parse().unwrap()];
        assert_eq!(codes, expected);
    }

    #[test]
    fn test_no_grants_is_not_an_error() {
        assert!(grant_codes(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_stored_code_fails_the_lookup() {
        let result = grant_codes(vec!["10".to_string(), "bad code".to_string()]);
        assert!(result.is_err());
    }
}
