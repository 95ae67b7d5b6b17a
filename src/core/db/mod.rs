/// Database Module
///
/// This module provides the relational access layer of TenantQL,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Statement Building** (`query.rs`): composes SELECT/INSERT text plus ordered parameters
/// - **Result Materialization** (`materialize.rs`): turns a cursor into tagged or string-keyed records
/// - **Sessions** (`connection.rs`): one live connection executing built statements
/// - **Schema Introspection** (`schema.rs`): table/column metadata and table DDL
/// - **Cluster** (`cluster.rs`): a directory of database files, one per database
///
/// ## Trust boundary
///
/// Table and column identifiers are spliced into statement text verbatim.
/// Callers must supply only validated identifiers; values always travel as
/// bound parameters.
pub mod cluster;
pub mod connection;
pub mod materialize;
pub mod query;
pub mod schema;

pub use cluster::*;
pub use connection::*;
pub use materialize::*;
pub use query::*;
pub use schema::*;
