//! Database connection management
//!
//! This module provides the SQLite connection wrapper and its [`Driver`]
//! implementation.

use rusqlite::{params_from_iter, Connection};
use std::rc::Rc;
use tracing::{debug, info};

use crate::database::core::driver::quote_ident;
use crate::database::{ContentValues, Driver, Query, Row, Value};
use crate::error::DriverError;

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self, DriverError> {
        Self::open_with(path, true)
    }

    /// Open a database, choosing whether foreign key constraints are enforced
    pub fn open_with(path: Option<&str>, foreign_keys: bool) -> Result<Self, DriverError> {
        let conn = match path {
            Some(p) => Connection::open(p).map_err(|source| DriverError::Open {
                path: p.to_string(),
                source,
            })?,
            None => Connection::open_in_memory().map_err(|source| DriverError::Open {
                path: ":memory:".to_string(),
                source,
            })?,
        };

        let db = DatabaseConn { conn };
        db.configure(foreign_keys)?;
        info!("Opened database at {}", path.unwrap_or(":memory:"));
        Ok(db)
    }

    /// Open a database at the specified path (convenience method)
    pub fn open_path(path: &str) -> Result<Self, DriverError> {
        Self::open(Some(path))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self, DriverError> {
        Self::open(None)
    }

    fn configure(&self, foreign_keys: bool) -> Result<(), DriverError> {
        // WAL is silently ignored for in-memory databases
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        self.conn.execute("PRAGMA synchronous=NORMAL", [])?;
        self.conn.execute("PRAGMA temp_store=MEMORY", [])?;

        let fk = if foreign_keys { "ON" } else { "OFF" };
        self.conn.execute(&format!("PRAGMA foreign_keys={}", fk), [])?;

        Ok(())
    }

    /// Execute a SQL statement with parameters
    pub fn execute_with_params<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<usize, DriverError> {
        debug!(sql, "execute");
        Ok(self.conn.execute(sql, params)?)
    }

    /// Begin an unchecked transaction
    ///
    /// Callers that need several saves to land atomically wrap them in one.
    pub fn transaction(&self) -> Result<rusqlite::Transaction<'_>, DriverError> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool, DriverError> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64, DriverError> {
        let query = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name));
        let count: u64 = self.conn.query_row(&query, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Names of all user tables, sorted
    pub fn table_names(&self) -> Result<Vec<String>, DriverError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn fetch(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DriverError> {
        debug!(sql, args = args.len(), "query");
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Rc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .into();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let cells = (0..width)
                .map(|i| row.get::<_, rusqlite::types::Value>(i))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(Row::new(Rc::clone(&columns), cells));
        }
        Ok(out)
    }
}

impl Driver for DatabaseConn {
    fn query(&self, table: &str, query: &Query) -> Result<Vec<Row>, DriverError> {
        self.fetch(&query.to_sql(table), &query.args)
    }

    fn raw_query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.fetch(sql, args)
    }

    fn insert(&self, table: &str, values: &ContentValues) -> Result<i64, DriverError> {
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            let columns = values
                .columns()
                .map(quote_ident)
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; values.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                columns,
                placeholders
            )
        };

        self.execute_with_params(&sql, params_from_iter(values.values()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(
        &self,
        table: &str,
        values: &ContentValues,
        where_clause: &str,
        args: &[Value],
    ) -> Result<usize, DriverError> {
        if values.is_empty() {
            return Ok(0);
        }

        let assignments = values
            .columns()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(table),
            assignments,
            where_clause
        );

        self.execute_with_params(&sql, params_from_iter(values.values().chain(args.iter())))
    }

    fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        args: &[Value],
    ) -> Result<usize, DriverError> {
        let sql = match where_clause {
            Some(clause) if !clause.trim().is_empty() => {
                format!("DELETE FROM {} WHERE {}", quote_ident(table), clause)
            }
            _ => format!("DELETE FROM {}", quote_ident(table)),
        };
        self.execute_with_params(&sql, params_from_iter(args.iter()))
    }

    fn execute(&self, sql: &str, args: &[Value]) -> Result<usize, DriverError> {
        self.execute_with_params(sql, params_from_iter(args.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes_db() -> DatabaseConn {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute(
            "CREATE TABLE Notes (Id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT, pinned INTEGER)",
            &[],
        )
        .unwrap();
        db
    }

    fn note(title: &str, pinned: bool) -> ContentValues {
        let mut values = ContentValues::new();
        values.put("title", title);
        values.put("pinned", pinned);
        values
    }

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_bad_path() {
        let result = DatabaseConn::open_path("/nonexistent-dir/for/sure/db.sqlite3");
        assert!(matches!(result, Err(DriverError::Open { .. })));
    }

    #[test]
    fn test_table_exists() {
        let db = notes_db();
        assert!(db.table_exists("Notes").unwrap());
        assert!(!db.table_exists("nonexistent_table").unwrap());
        assert_eq!(db.table_names().unwrap(), vec!["Notes".to_string()]);
    }

    #[test]
    fn test_insert_query_update_delete() {
        let db = notes_db();
        let first = db.insert("Notes", &note("a", true)).unwrap();
        let second = db.insert("Notes", &note("b", false)).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(db.table_count("Notes").unwrap(), 2);

        let rows = db
            .query(
                "Notes",
                &Query::new()
                    .selection("pinned = ?", [Value::Bool(true)])
                    .order_by("Id"),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].column_names().to_vec(), vec!["Id", "title", "pinned"]);
        assert_eq!(rows[0].get_string(1).unwrap(), "a");

        let updated = db
            .update("Notes", &note("c", true), "Id = ?", &[Value::Long(second)])
            .unwrap();
        assert_eq!(updated, 1);

        let rows = db
            .raw_query("SELECT title FROM Notes WHERE Id = ?", &[Value::Long(2)])
            .unwrap();
        assert_eq!(rows[0].get_string(0).unwrap(), "c");

        let deleted = db
            .delete("Notes", Some("pinned = ?"), &[Value::Bool(true)])
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(db.delete("Notes", None, &[]).unwrap(), 0);
    }

    #[test]
    fn test_insert_default_values() {
        let db = notes_db();
        let id = db.insert("Notes", &ContentValues::new()).unwrap();
        let rows = db.raw_query("SELECT * FROM Notes", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_long(0).unwrap(), id);
        assert!(rows[0].is_null(1));
    }

    #[test]
    fn test_update_with_no_values() {
        let db = notes_db();
        let count = db
            .update("Notes", &ContentValues::new(), "Id = 1", &[])
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_driver_error_propagates() {
        let db = notes_db();
        let result = db.query("Missing", &Query::new());
        assert!(matches!(result, Err(DriverError::Sqlite(_))));
    }
}
