//! Core reporting logic for Vitrine.
//!
//! This crate contains the branch-scoped reporting engine with ZERO web or
//! database dependencies. The data source and the branch grant lookup are
//! traits implemented by outer crates.
//!
//! # Modules
//!
//! - `branch` - Branch authorization resolution and selection negotiation
//! - `period` - Current / previous month / previous year windows
//! - `reports` - Fan-out fetching, hierarchy aggregation, comparisons and pages

pub mod branch;
pub mod period;
pub mod reports;
