#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Rowbound - a small object-relational mapper over SQLite
//!
//! Typed records act as persisted rows without hand-written SQL for basic
//! CRUD. Each entity type declares its columns once; a [`Session`] resolves
//! the mapping, converts fields to and from column values, and keeps at most
//! one live instance per persisted key.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - **[`database`]**: SQLite connection, the [`Driver`] boundary, rows and values
//! - **[`mapping`]**: entity declarations, serializers, schema catalog,
//!   value codec and identity cache
//! - **[`session`]**: the unit of work and its record-lifecycle operations
//! - **[`config`]**: Configuration management
//!
//! # Quick Start
//!
//! ```rust
//! use rowbound::{Entity, Handle, SchemaBuilder, Session};
//!
//! #[derive(Debug, Default)]
//! struct Note {
//!     title: String,
//!     pinned: bool,
//! }
//!
//! impl Entity for Note {
//!     const TABLE: &'static str = "Notes";
//!
//!     fn declare(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .column("title", |n| Some(&n.title), |n, v| n.title = v)
//!             .column("pinned", |n| Some(&n.pinned), |n, v| n.pinned = v);
//!     }
//! }
//!
//! # fn main() -> Result<(), rowbound::OrmError> {
//! let session = Session::open_in_memory()?;
//! session.create_table::<Note>()?;
//!
//! let note = Handle::new(Note { title: "groceries".into(), pinned: false });
//! let id = note.save(&session)?;
//!
//! note.borrow_mut().pinned = true;
//! note.save(&session)?;
//!
//! let loaded = session.load::<Note>(id)?.unwrap();
//! assert!(Handle::ptr_eq(&loaded, &note));
//!
//! note.delete(&session)?;
//! assert!(session.load::<Note>(id)?.is_none());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod mapping;
pub mod session;

#[cfg(test)]
mod test_fixtures;

// =============================================================================
// Configuration
// =============================================================================

pub use config::RowboundConfig;

// =============================================================================
// Errors
// =============================================================================

pub use error::{CodecError, DriverError, ErrorPolicy, OrmError, Result, SerializationError};

// =============================================================================
// Database and mapping types
// =============================================================================

pub use database::{ContentValues, DatabaseConn, Driver, PrimitiveKind, Query, Row, Value};

pub use mapping::{
    DateTimeSerializer, Entity, Handle, JsonSerializer, NaiveDateSerializer, SchemaBuilder,
    SerializerRegistry, TypeSerializer,
};

pub use session::{Session, SessionOptions, DEFAULT_MAX_REFERENCE_DEPTH};
