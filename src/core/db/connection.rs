/// Session Module
///
/// A [`Session`] owns one live SQLite connection and executes built
/// statements on it. Sessions carry no query state between calls: every
/// filter travels with the statement it belongs to.

use crate::core::db::materialize::{
    is_boolean_decl, GenericRecord, Materializer, Record, SqliteCursor, Value,
};
use crate::core::db::query::{build_insert, build_select, Filter, Statement};
use crate::core::Result;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, error};

/// A single live connection, optionally bound to a named database of a cluster.
#[derive(Debug)]
pub struct Session {
    conn: Connection,
    database: Option<String>,
}

impl Session {
    /// Wraps a caller-supplied connection.
    pub fn from_connection(conn: Connection) -> Self {
        Session {
            conn,
            database: None,
        }
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Session::from_connection(Connection::open_in_memory()?))
    }

    pub(crate) fn for_database(conn: Connection, database: &str) -> Self {
        Session {
            conn,
            database: Some(database.to_string()),
        }
    }

    /// Name of the cluster database this session targets, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Executes `stmt` and hands the lazy record stream to `f`.
    ///
    /// The stream borrows the running statement, so it is only available
    /// inside `f`.
    ///
    /// # Errors
    ///
    /// Returns `TenantqlError::Backend` if the statement cannot be prepared
    /// or its parameters cannot be bound, plus whatever `f` returns.
    pub fn query<T, F>(&self, stmt: &Statement, f: F) -> Result<T>
    where
        F: FnOnce(Materializer<SqliteCursor<'_>>) -> Result<T>,
    {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "query");

        let mut prepared = self.conn.prepare(&stmt.sql).map_err(|e| {
            error!("Failed to prepare {}: {}", stmt.sql, e);
            e
        })?;
        let (columns, booleans): (Vec<String>, Vec<bool>) = prepared
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), is_boolean_decl(c.decl_type())))
            .unzip();
        let rows = prepared.query(params_from_iter(stmt.params.iter()))?;

        f(Materializer::new(SqliteCursor::new(columns, booleans, rows)))
    }

    /// Executes `stmt` and collects tagged records.
    pub fn records(&self, stmt: &Statement) -> Result<Vec<Record>> {
        self.query(stmt, |rows| rows.collect())
    }

    /// Executes `stmt` and collects string-keyed records.
    pub fn generic_records(&self, stmt: &Statement) -> Result<Vec<GenericRecord>> {
        self.query(stmt, |rows| rows.generic().collect())
    }

    /// Builds, executes and materializes a SELECT in one call.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenantql::core::db::{Filter, Session};
    /// let session = Session::open_in_memory().unwrap();
    /// session.execute("CREATE TABLE t (a TEXT, b INTEGER)").unwrap();
    /// session.execute("INSERT INTO t VALUES ('x', NULL)").unwrap();
    /// let rows = session.find(&["t"], &["a", "b"], Some(Filter::new("a = ?1", ["x"]))).unwrap();
    /// assert_eq!(rows[0]["b"], "NULL");
    /// ```
    pub fn find<T, C>(
        &self,
        tables: &[T],
        columns: &[C],
        filter: Option<Filter>,
    ) -> Result<Vec<GenericRecord>>
    where
        T: AsRef<str>,
        C: AsRef<str>,
    {
        let stmt = build_select(tables, columns, filter)?;
        self.generic_records(&stmt)
    }

    /// Inserts one row and returns its rowid.
    pub fn insert<K: AsRef<str>>(&self, table: &str, values: &[(K, Value)]) -> Result<i64> {
        let stmt = build_insert(table, values)?;
        self.execute_statement(&stmt)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Executes a single parameterised statement, returning the rows affected.
    pub fn execute_statement(&self, stmt: &Statement) -> Result<usize> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "execute");
        self.conn
            .execute(&stmt.sql, params_from_iter(stmt.params.iter()))
            .map_err(|e| {
                error!("Failed to execute {}: {}", stmt.sql, e);
                e.into()
            })
    }

    /// Executes a single statement without parameters.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.execute_statement(&Statement::new(sql, Vec::new()))
    }
}
