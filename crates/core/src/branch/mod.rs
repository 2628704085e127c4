//! Branch-level authorization.
//!
//! This module decides which branches a caller may see:
//! - `resolver` turns a caller's recorded grants into an `AuthorizationScope`
//! - `scope` reconciles the requested branch filter with that scope

pub mod resolver;
pub mod scope;

#[cfg(test)]
mod tests;

pub use resolver::{
    AuthorizationError, BranchAuthorizationResolver, BranchGrantSource, CallerContext,
    GrantLookupError,
};
pub use scope::{AuthorizationScope, BranchSelection, negotiate};
