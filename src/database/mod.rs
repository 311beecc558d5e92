//! Database module
//!
//! Storage-facing types for rowbound:
//!
//! - **core**: SQLite connection wrapper, the [`Driver`] boundary, fetched
//!   [`Row`]s and the primitive [`Value`]s written to columns
//!
//! # Architecture
//!
//! ```text
//! database/
//! └── core/
//!     ├── connection  # SQLite DatabaseConn wrapper, Driver impl
//!     ├── driver      # Driver trait, Query, ContentValues
//!     ├── row         # Row with typed accessors
//!     └── value       # Value, PrimitiveKind
//! ```
//!
//! # Usage
//!
//! ```rust
//! use rowbound::database::{ContentValues, DatabaseConn, Driver, Query};
//!
//! let db = DatabaseConn::open_in_memory().unwrap();
//! db.execute("CREATE TABLE t (Id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
//!
//! let mut values = ContentValues::new();
//! values.put("name", "x");
//! let id = db.insert("t", &values).unwrap();
//!
//! let rows = db.query("t", &Query::new().order_by("Id")).unwrap();
//! assert_eq!(rows[0].get_long(0).unwrap(), id);
//! ```

pub mod core;

// =============================================================================
// SQLite Types
// =============================================================================

pub use core::{
    quote_ident, ContentValues, DatabaseConn, Driver, Primitive, PrimitiveKind, Query, Row, Value,
};
