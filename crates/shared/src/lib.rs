//! Shared types, errors, and configuration for Vitrine.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for users, tenants and branches
//! - Pagination types for report pages
//! - Application-wide error types
//! - Configuration management
//! - JWT claims and token validation

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;


pub use auth::Claims;
pub use config::{AppConfig, ReportsConfig};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
