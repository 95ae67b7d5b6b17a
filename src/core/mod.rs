/// Core Module for TenantQL
///
/// This module contains the fundamental components the rest of the crate is
/// built on: statement building, result materialization, schema
/// introspection, database management and error handling.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, Result, TenantqlError};
