//! Branch authorization resolver.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};
use vitrine_shared::types::{BranchId, TenantId, UserId};

use super::scope::AuthorizationScope;

/// The already-authenticated caller of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    /// Tenant the caller is acting in.
    pub tenant: TenantId,
    /// The caller.
    pub user: UserId,
}

impl CallerContext {
    /// Creates a caller context.
    #[must_use]
    pub const fn new(tenant: TenantId, user: UserId) -> Self {
        Self { tenant, user }
    }
}

/// The grant store could not be queried.
#[derive(Debug, Error)]
#[error("branch grant lookup failed: {0}")]
pub struct GrantLookupError(pub String);

/// Source of explicit per-user branch grants.
#[async_trait]
pub trait BranchGrantSource: Send + Sync {
    /// Returns the branches explicitly granted to `user` within `tenant`.
    ///
    /// An empty list is a valid answer. Failing to answer must be an error.
    async fn branch_grants(
        &self,
        tenant: TenantId,
        user: UserId,
    ) -> Result<Vec<BranchId>, GrantLookupError>;
}

/// Errors raised while resolving a caller's branch scope.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Grants could not be read; access must be denied.
    #[error("could not determine branch permissions for user {user}")]
    LookupFailed {
        /// The caller whose grants were being read.
        user: UserId,
        /// Underlying lookup failure.
        #[source]
        source: GrantLookupError,
    },
}

/// Resolves a caller into an `AuthorizationScope`. Fails closed.
#[derive(Clone)]
pub struct BranchAuthorizationResolver {
    grants: Arc<dyn BranchGrantSource>,
}

impl std::fmt::Debug for BranchAuthorizationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchAuthorizationResolver").finish_non_exhaustive()
    }
}

impl BranchAuthorizationResolver {
    /// Creates a resolver backed by `grants`.
    #[must_use]
    pub fn new(grants: Arc<dyn BranchGrantSource>) -> Self {
        Self { grants }
    }

    /// Resolves the caller's scope.
    ///
    /// # Errors
    ///
    /// Returns `AuthorizationError::LookupFailed` when the grant lookup itself
    /// fails. A failed lookup never yields `Unrestricted`.
    pub async fn resolve(
        &self,
        caller: &CallerContext,
    ) -> Result<AuthorizationScope, AuthorizationError> {
        let grants = self
            .grants
            .branch_grants(caller.tenant, caller.user)
            .await
            .map_err(|source| {
                error!(
                    tenant = %caller.tenant,
                    user = %caller.user,
                    error = %source,
                    "Branch grant lookup failed; denying access"
                );
                AuthorizationError::LookupFailed {
                    user: caller.user,
                    source,
                }
            })?;

        let scope = AuthorizationScope::from_grants(grants);
        debug!(user = %caller.user, scope = ?scope, "Resolved branch scope");
        Ok(scope)
    }
}
