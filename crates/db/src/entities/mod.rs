//! `SeaORM` entities for the reporting tables.

pub mod branches;
pub mod tenants;
pub mod user_branch_grants;
