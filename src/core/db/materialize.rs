/// Result Materialization Module
///
/// Converts a backend cursor into records. Every row becomes a [`Record`]
/// holding tagged [`Value`]s; the display-oriented [`GenericRecord`] is
/// derived from it by rendering each value to its canonical string form.

use crate::core::{Result, TenantqlError};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Rendering of SQL NULL in a [`GenericRecord`].
///
/// A text column holding the string "NULL" renders identically; callers
/// that must tell the two apart should read [`Record`] values instead.
pub const NULL_SENTINEL: &str = "NULL";

/// Column name to canonical string value, one entry per cursor column.
pub type GenericRecord = BTreeMap<String, String>;

/// A single backend value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Renders the value the way a [`GenericRecord`] stores it.
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text or rendered form, `None` for NULL.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.render()),
        }
    }

    /// Interprets booleans and 0/1-style integers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Converts a SQLite value, treating integers of a boolean-declared column as `Bool`.
    fn from_value_ref(value: ValueRef<'_>, boolean_column: bool) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) if boolean_column && (i == 0 || i == 1) => Value::Bool(i == 1),
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(NULL_SENTINEL),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => f.write_str(&real_text(*r)),
            Value::Text(t) => f.write_str(t),
            Value::Blob(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Renders a REAL the way SQLite's `CAST(x AS TEXT)` does: 15 significant
/// digits, at least one fractional digit, exponent form outside `1e-4..1e15`.
fn real_text(r: f64) -> String {
    if r.is_nan() {
        return NULL_SENTINEL.to_string();
    }
    if r.is_infinite() {
        return if r > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if r == 0.0 {
        return "0.0".to_string();
    }

    let scientific = format!("{:.14e}", r.abs());
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let sign = if r < 0.0 { "-" } else { "" };

    if !(-4..15).contains(&exponent) {
        let (lead, rest) = digits.split_at(1);
        return format!(
            "{}{}.{}e{}{:02}",
            sign,
            lead,
            if rest.is_empty() { "0" } else { rest },
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        );
    }

    let (whole, fraction) = if exponent < 0 {
        ("0".to_string(), format!("{}{}", "0".repeat((-exponent - 1) as usize), digits))
    } else {
        let whole_len = exponent as usize + 1;
        if digits.len() > whole_len {
            (digits[..whole_len].to_string(), digits[whole_len..].to_string())
        } else {
            (format!("{:0<width$}", digits, width = whole_len), "0".to_string())
        }
    };
    format!("{}{}.{}", sign, whole, fraction)
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// A forward-only iteration handle over result rows.
pub trait Cursor {
    /// Result column names, in order.
    fn columns(&self) -> &[String];

    /// Advances to the next row, returning its values or `None` once exhausted.
    fn advance(&mut self) -> Result<Option<Vec<Value>>>;
}

/// [`Cursor`] over a running SQLite statement.
pub struct SqliteCursor<'stmt> {
    columns: Vec<String>,
    boolean_columns: Vec<bool>,
    rows: rusqlite::Rows<'stmt>,
}

impl<'stmt> SqliteCursor<'stmt> {
    /// Column names and boolean flags must be read from the statement
    /// before it is stepped.
    pub fn new(
        columns: Vec<String>,
        boolean_columns: Vec<bool>,
        rows: rusqlite::Rows<'stmt>,
    ) -> Self {
        SqliteCursor {
            columns,
            boolean_columns,
            rows,
        }
    }
}

/// Whether a declared SQLite column type denotes a boolean.
pub(crate) fn is_boolean_decl(decl_type: Option<&str>) -> bool {
    decl_type
        .map(|t| t.to_ascii_uppercase().contains("BOOL"))
        .unwrap_or(false)
}

impl<'stmt> Cursor for SqliteCursor<'stmt> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn advance(&mut self) -> Result<Option<Vec<Value>>> {
        let row = match self.rows.next()? {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut values = Vec::with_capacity(self.columns.len());
        for i in 0..self.columns.len() {
            let boolean = self.boolean_columns.get(i).copied().unwrap_or(false);
            values.push(Value::from_value_ref(row.get_ref(i)?, boolean));
        }
        Ok(Some(values))
    }
}

/// One materialized row: ordered column names with tagged values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the named column (first match).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Renders every value into the string-keyed form.
    ///
    /// Duplicate column names collapse to one key; the last value wins.
    pub fn to_generic(&self) -> GenericRecord {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), value.render()))
            .collect()
    }
}

/// Lazy, single-pass conversion of a cursor into records.
///
/// Yields one item per row in cursor order. The first failure is yielded as
/// an `Err` and ends the iteration; records yielded before it stay valid.
pub struct Materializer<C: Cursor> {
    cursor: C,
    columns: Arc<[String]>,
    done: bool,
}

impl<C: Cursor> Materializer<C> {
    pub fn new(cursor: C) -> Self {
        let columns: Arc<[String]> = cursor.columns().to_vec().into();
        Materializer {
            cursor,
            columns,
            done: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Switches to string-keyed output.
    pub fn generic(self) -> impl Iterator<Item = Result<GenericRecord>> {
        self.map(|record| record.map(|r| r.to_generic()))
    }
}

impl<C: Cursor> Iterator for Materializer<C> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.cursor.advance() {
            Ok(Some(values)) if values.len() == self.columns.len() => Some(Ok(Record {
                columns: Arc::clone(&self.columns),
                values,
            })),
            Ok(Some(values)) => {
                self.done = true;
                Some(Err(TenantqlError::Backend(rusqlite::Error::InvalidColumnIndex(
                    values.len().max(self.columns.len()),
                ))))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Materializes a whole cursor into string-keyed records.
pub fn materialize<C: Cursor>(cursor: C) -> Result<Vec<GenericRecord>> {
    Materializer::new(cursor).generic().collect()
}
