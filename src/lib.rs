//! TenantQL: a generic relational-data access layer for single-tenant-per-database
//! platforms. Builds ad-hoc SELECT/INSERT statements, materializes rows into
//! uniform records, introspects the catalog, and provisions tenant databases.

// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod tenant;

#[cfg(test)]
mod test_utils;
