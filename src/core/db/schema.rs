/// Schema Introspection Module
///
/// Lists user tables and per-column metadata from SQLite's catalog, and
/// renders table DDL for [`TableSpec`]s.
///
/// Every managed table gets two implicit columns: a serial identity `tid`
/// and a `created` timestamp defaulting to the insertion time.

use crate::core::db::connection::Session;
use crate::core::db::materialize::{Record, Value};
use crate::core::db::query::{Filter, Statement};
use crate::core::{Result, TenantqlError};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Logical column types accepted in table definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Numeric,
    Real,
    Text,
    Timestamp,
}

impl ColumnType {
    /// Backend type name used in DDL.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Numeric => "numeric",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A column definition used as DDL input.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub default_expr: Option<String>,
    pub unique: bool,
}

impl ColumnSpec {
    /// A nullable, non-unique column without default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.into(),
            column_type,
            not_null: false,
            default_expr: None,
            unique: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default_expr = Some(expr.into());
        self
    }

    fn definition(&self) -> String {
        let mut def = format!("{} {}", self.name, self.column_type);
        if self.not_null {
            def.push_str(" NOT NULL");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(expr) = &self.default_expr {
            def.push_str(" DEFAULT ");
            def.push_str(expr);
        }
        def
    }
}

/// A table definition: name plus ordered columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        TableSpec {
            name: name.into(),
            columns,
        }
    }
}

/// A user table as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub name: String,
}

/// Per-column metadata recovered from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub default_expr: Option<String>,
    pub nullable: bool,
    pub data_type: String,
    pub max_length: Option<u32>,
    pub numeric_precision: Option<u32>,
    pub numeric_radix: Option<u32>,
    pub is_primary_key: bool,
    pub is_unique: bool,
}

/// Renders `CREATE TABLE` for `spec`, adding the `tid` and `created` columns.
///
/// # Errors
///
/// Returns `TenantqlError::InvalidQuery` for a blank table name.
pub fn create_table_sql(spec: &TableSpec, if_not_exists: bool) -> Result<String> {
    if spec.name.trim().is_empty() {
        return Err(TenantqlError::InvalidQuery(
            "CREATE TABLE requires a table name".to_string(),
        ));
    }

    let mut definitions = vec!["tid INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    definitions.extend(spec.columns.iter().map(ColumnSpec::definition));
    definitions.push("created timestamp DEFAULT CURRENT_TIMESTAMP".to_string());

    Ok(format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        spec.name,
        definitions.join(", ")
    ))
}

const TABLES_SOURCE: &str = "sqlite_master";

const COLUMNS_SQL: &str = r#"
SELECT c.name AS column_name,
       c.dflt_value AS column_default,
       CASE WHEN c."notnull" = 0 AND c.pk = 0 THEN 'YES' ELSE 'NO' END AS is_nullable,
       c.type AS declared_type,
       c.pk > 0 AS primarykey,
       EXISTS (
           SELECT 1
           FROM pragma_index_list(?1) AS il
           JOIN pragma_index_info(il.name) AS ii
           WHERE il."unique" = 1 AND il.origin = 'u' AND ii.name = c.name
       ) AS uniquekey
FROM pragma_table_info(?1) AS c
WHERE EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)
ORDER BY c.cid"#;

impl Session {
    /// Lists the user tables of the main schema.
    ///
    /// Order is whatever the catalog returns.
    pub fn list_tables(&self) -> Result<Vec<TableRef>> {
        // `_` is a LIKE wildcard; only the literal `sqlite_` prefix is reserved
        let filter = Filter::new(
            r"type = ?1 AND name NOT LIKE ?2 ESCAPE '\'",
            ["table", r"sqlite\_%"],
        );
        let rows = self.find(&[TABLES_SOURCE], &["name AS tablename"], Some(filter))?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove("tablename"))
            .map(|name| TableRef { name })
            .collect())
    }

    /// Lists column metadata for `table` in physical column order.
    ///
    /// Only ordinary tables are described; an unknown table or a view yields
    /// an empty list.
    pub fn list_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let stmt = Statement::new(COLUMNS_SQL, vec![Value::from(table)]);
        let records = self.records(&stmt)?;
        debug!(table, columns = records.len(), "introspected columns");
        Ok(records.iter().map(column_from_record).collect())
    }

    /// Creates `spec` as a new table.
    pub fn create_table(&self, spec: &TableSpec) -> Result<()> {
        self.execute(&create_table_sql(spec, false)?)?;
        info!("Created table {}", spec.name);
        Ok(())
    }

    /// Creates `spec` unless a table of that name already exists.
    pub fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        self.execute(&create_table_sql(spec, true)?)?;
        Ok(())
    }
}

fn column_from_record(record: &Record) -> ColumnMetadata {
    let text = |column: &str| record.get(column).and_then(Value::as_text);
    let flag = |column: &str| record.get(column).and_then(Value::as_bool).unwrap_or(false);

    let declared = text("declared_type").unwrap_or_default();
    let (data_type, args) = split_declared_type(&declared);
    let (max_length, numeric_precision, numeric_radix) = type_dimensions(&data_type, &args);

    ColumnMetadata {
        name: text("column_name").unwrap_or_default(),
        default_expr: text("column_default"),
        nullable: text("is_nullable").as_deref() == Some("YES"),
        data_type,
        max_length,
        numeric_precision,
        numeric_radix,
        is_primary_key: flag("primarykey"),
        is_unique: flag("uniquekey"),
    }
}

/// Splits `varchar(20)` into (`varchar`, [20]).
fn split_declared_type(declared: &str) -> (String, Vec<u32>) {
    let declared = declared.trim();
    match declared.find('(') {
        Some(open) => {
            let base = declared[..open].trim().to_lowercase();
            let args = declared[open + 1..]
                .trim_end_matches(')')
                .split(',')
                .filter_map(|arg| arg.trim().parse().ok())
                .collect();
            (base, args)
        }
        None => (declared.to_lowercase(), Vec::new()),
    }
}

/// Character length, numeric precision and radix for a base type, where meaningful.
fn type_dimensions(base: &str, args: &[u32]) -> (Option<u32>, Option<u32>, Option<u32>) {
    let is_character = base.contains("char") || base == "clob";
    if is_character {
        return (args.first().copied(), None, None);
    }
    if base == "numeric" || base == "decimal" {
        return (None, args.first().copied(), Some(10));
    }
    if base.contains("int") {
        return (None, Some(64), Some(2));
    }
    if base == "real" || base.contains("double") || base.contains("float") {
        return (None, Some(53), Some(2));
    }
    (None, None, None)
}
