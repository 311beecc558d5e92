//! Core database infrastructure
//!
//! This module provides the foundational storage components used by the mapping engine:
//! - `DatabaseConn`: SQLite connection wrapper and driver implementation
//! - `Driver`: the storage boundary the record gateway talks to
//! - `Row` / `Value`: fetched rows and the primitive values written to columns

mod connection;
mod driver;
mod row;
mod value;

pub use connection::DatabaseConn;
pub use driver::{quote_ident, ContentValues, Driver, Query};
pub use row::Row;
pub use value::{Primitive, PrimitiveKind, Value};
