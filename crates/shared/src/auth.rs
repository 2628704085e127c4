//! Authentication claims carried by access tokens.
//!
//! Tokens are issued by the identity service in front of Vitrine; this
//! crate only needs to read them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{TenantId, UserId};

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Tenant the token was issued for.
    pub tenant: Uuid,
    /// User's role within the tenant.
    pub role: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        UserId::from_uuid(self.sub)
    }

    /// Returns the tenant ID from claims.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant)
    }
}
