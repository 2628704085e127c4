//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the reporting engine.

pub mod branch_grant;
pub mod stored_procedure;

pub use branch_grant::BranchGrantRepository;
pub use stored_procedure::{StoredProcedureSource, procedure_call_sql, validate_identifier};
