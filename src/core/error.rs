/// TenantQL Error Module
///
/// This module defines the error type shared by every layer of the crate:
/// statement building, backend execution, the database cluster, tenant
/// provisioning and configuration.
use thiserror::Error;

/// Error type for TenantQL operations.
///
/// Builder validation errors never reach the backend. Backend errors are
/// surfaced verbatim, without retry or masking.
#[derive(Error, Debug)]
pub enum TenantqlError {
    /// Malformed builder input (empty table list, empty column list, ...)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A database name that cannot be mapped onto the cluster directory
    #[error("Invalid database name: {0:?}")]
    InvalidName(String),

    /// Connection, statement execution or cursor-read failure from SQLite
    #[error("Backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// File-system failure while managing database files
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// `CREATE DATABASE` on a name that already exists
    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    /// Opening or dropping a database that does not exist
    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    /// Tenant database was created but the registry write failed
    #[error("Provisioning of {database} failed (rolled back: {rolled_back}): {source}")]
    ProvisioningFailed {
        database: String,
        rolled_back: bool,
        #[source]
        source: Box<TenantqlError>,
    },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON rendering errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`TenantqlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidQuery,
    Backend,
    ProvisioningFailed,
    Config,
    Output,
}

impl TenantqlError {
    /// Returns the kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TenantqlError::InvalidQuery(_) | TenantqlError::InvalidName(_) => ErrorKind::InvalidQuery,
            TenantqlError::Backend(_)
            | TenantqlError::Storage(_)
            | TenantqlError::DatabaseExists(_)
            | TenantqlError::UnknownDatabase(_) => ErrorKind::Backend,
            TenantqlError::ProvisioningFailed { .. } => ErrorKind::ProvisioningFailed,
            TenantqlError::Config(_) => ErrorKind::Config,
            TenantqlError::Json(_) => ErrorKind::Output,
        }
    }
}

/// Type alias for Result to use TenantqlError as the error type.
pub type Result<T> = std::result::Result<T, TenantqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = TenantqlError::Backend(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Backend error"));

        let query_err = TenantqlError::InvalidQuery("no columns".to_string());
        assert!(query_err.to_string().contains("Invalid query"));

        let config_err = TenantqlError::Config("Invalid config".to_string());
        assert!(config_err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(TenantqlError::InvalidName("a/b".into()).kind(), ErrorKind::InvalidQuery);
        assert_eq!(TenantqlError::DatabaseExists("x".into()).kind(), ErrorKind::Backend);
        assert_eq!(TenantqlError::UnknownDatabase("x".into()).kind(), ErrorKind::Backend);

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TenantqlError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Backend);

        let failed = TenantqlError::ProvisioningFailed {
            database: "account_20240101000000".into(),
            rolled_back: true,
            source: Box::new(TenantqlError::Backend(rusqlite::Error::QueryReturnedNoRows)),
        };
        assert_eq!(failed.kind(), ErrorKind::ProvisioningFailed);
        assert!(failed.to_string().contains("account_20240101000000"));
        assert!(std::error::Error::source(&failed).is_some());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: TenantqlError = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Output);
    }
}
