//! Common types used across the application.

pub mod id;
pub mod pagination;

#[cfg(test)]
#[path = "id_tests.rs"]
mod id_tests;

pub use id::*;
pub use pagination::{PageMeta, PageRequest};
