//! Driver boundary
//!
//! The mapping engine never talks to SQLite directly; it goes through the
//! [`Driver`] trait so tests and alternative backends can stand in.

use crate::database::{Row, Value};
use crate::error::DriverError;

/// Storage operations consumed by the record gateway
///
/// Every call is synchronous and issues a single statement.
pub trait Driver {
    /// Filtered fetch from one table
    fn query(&self, table: &str, query: &Query) -> Result<Vec<Row>, DriverError>;

    /// Fetch with caller-supplied SQL
    fn raw_query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DriverError>;

    /// Insert a row and return its new key
    fn insert(&self, table: &str, values: &ContentValues) -> Result<i64, DriverError>;

    /// Update matching rows and return the affected count
    fn update(
        &self,
        table: &str,
        values: &ContentValues,
        where_clause: &str,
        args: &[Value],
    ) -> Result<usize, DriverError>;

    /// Delete matching rows (all rows when `where_clause` is `None`)
    fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        args: &[Value],
    ) -> Result<usize, DriverError>;

    /// Execute a statement that returns no rows (DDL, pragmas)
    fn execute(&self, sql: &str, args: &[Value]) -> Result<usize, DriverError>;
}

/// Parameters of a filtered table query
///
/// All clauses are optional; `None` leaves the clause out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Columns to select, all columns when `None`
    pub columns: Option<Vec<String>>,
    /// WHERE clause with `?` placeholders
    pub selection: Option<String>,
    /// Arguments bound to the selection placeholders
    pub args: Vec<Value>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn selection<I>(mut self, selection: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.selection = Some(selection.into());
        self.args = args.into_iter().collect();
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: impl ToString) -> Self {
        self.limit = Some(limit.to_string());
        self
    }

    /// Render the SELECT statement for `table`
    pub fn to_sql(&self, table: &str) -> String {
        let columns = match &self.columns {
            Some(cols) if !cols.is_empty() => cols.join(", "),
            _ => "*".to_string(),
        };

        let mut sql = format!("SELECT {} FROM {}", columns, quote_ident(table));
        if let Some(selection) = non_empty(&self.selection) {
            sql.push_str(&format!(" WHERE {}", selection));
        }
        if let Some(group_by) = non_empty(&self.group_by) {
            sql.push_str(&format!(" GROUP BY {}", group_by));
        }
        if let Some(having) = non_empty(&self.having) {
            sql.push_str(&format!(" HAVING {}", having));
        }
        if let Some(order_by) = non_empty(&self.order_by) {
            sql.push_str(&format!(" ORDER BY {}", order_by));
        }
        if let Some(limit) = non_empty(&self.limit) {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }
}

fn non_empty(clause: &Option<String>) -> Option<&str> {
    clause.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Ordered column → value set written by insert and update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentValues {
    entries: Vec<(String, Value)>,
}

impl ContentValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier value for the same column
    pub fn put(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn put_null(&mut self, column: impl Into<String>) {
        self.put(column, Value::Null);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}
