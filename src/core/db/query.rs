/// Statement Building Module
///
/// Composes SELECT and INSERT statement text plus an ordered parameter list
/// from structural inputs. Building is pure: nothing here touches a
/// connection.
///
/// Placeholders use SQLite's numbered form (`?1`, `?2`, ...). The builder
/// never checks that a filter's placeholders match its parameters; a
/// mismatch surfaces as a backend error when the statement is executed.

use crate::core::db::materialize::Value;
use crate::core::{Result, TenantqlError};

/// Column marker selecting every column of the listed tables.
pub const ALL_COLUMNS: &str = "*";

/// A WHERE predicate together with the values bound to its placeholders.
///
/// A filter is passed into each build call and consumed by it, so predicate
/// state never outlives the statement it was built for.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    predicate: String,
    params: Vec<Value>,
}

impl Filter {
    /// Creates a filter from a predicate template and its positional parameters.
    ///
    /// ```
    /// use tenantql::core::db::Filter;
    /// let filter = Filter::new("schemaname = ?1 AND owner = ?2", ["public", "admin"]);
    /// assert_eq!(filter.params().len(), 2);
    /// ```
    pub fn new<I, V>(predicate: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter {
            predicate: predicate.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a filter without parameters.
    pub fn raw(predicate: impl Into<String>) -> Self {
        Filter {
            predicate: predicate.into(),
            params: Vec::new(),
        }
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Statement text plus the parameters to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Wraps hand-written SQL and its parameters.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Statement {
            sql: sql.into(),
            params,
        }
    }
}

/// Builds `SELECT <columns> FROM <tables> [WHERE <predicate>]`.
///
/// # Errors
///
/// Returns `TenantqlError::InvalidQuery` if `tables` or `columns` is empty.
/// Pass [`ALL_COLUMNS`] to select every column.
pub fn build_select<T, C>(tables: &[T], columns: &[C], filter: Option<Filter>) -> Result<Statement>
where
    T: AsRef<str>,
    C: AsRef<str>,
{
    if tables.is_empty() {
        return Err(TenantqlError::InvalidQuery(
            "SELECT requires at least one table".to_string(),
        ));
    }
    if columns.is_empty() {
        return Err(TenantqlError::InvalidQuery(format!(
            "SELECT requires at least one column (use \"{}\" for all columns)",
            ALL_COLUMNS
        )));
    }

    let mut sql = format!("SELECT {} FROM {}", join(columns), join(tables));
    let params = match filter {
        Some(filter) if !filter.predicate.trim().is_empty() => {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.predicate);
            filter.params
        }
        _ => Vec::new(),
    };

    Ok(Statement { sql, params })
}

/// Builds `INSERT INTO <table> (<columns>) VALUES (?1, ..., ?N)`.
///
/// `values` is an ordered list of column/value pairs; its order fixes both
/// the column list and the placeholder/parameter order.
///
/// # Errors
///
/// Returns `TenantqlError::InvalidQuery` if `table` is blank or `values` is empty.
pub fn build_insert<K>(table: &str, values: &[(K, Value)]) -> Result<Statement>
where
    K: AsRef<str>,
{
    if table.trim().is_empty() {
        return Err(TenantqlError::InvalidQuery(
            "INSERT requires a table name".to_string(),
        ));
    }
    if values.is_empty() {
        return Err(TenantqlError::InvalidQuery(format!(
            "INSERT into {} requires at least one column",
            table
        )));
    }

    let columns: Vec<&str> = values.iter().map(|(column, _)| column.as_ref()).collect();
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
    let params = values.iter().map(|(_, value)| value.clone()).collect();

    Ok(Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(","),
            placeholders.join(",")
        ),
        params,
    })
}

fn join<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}
