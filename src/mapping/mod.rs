//! Mapping engine
//!
//! - **entity**: the [`Entity`] trait and live instance [`Handle`]s
//! - **serializer**: domain type ↔ primitive converters
//! - **schema**: column declarations and the per-type [`SchemaCatalog`]
//! - **codec**: field ↔ column value conversion
//! - **identity**: the per-session [`IdentityCache`]

pub mod codec;
pub mod entity;
pub mod identity;
pub mod schema;
pub mod serializer;

pub use entity::{Entity, Handle};
pub use identity::IdentityCache;
pub use schema::{
    ColumnDescriptor, DeclaredType, FieldRef, FieldValue, ReferenceTarget, SchemaBuilder,
    SchemaCatalog, TableSchema,
};
pub use serializer::{
    DateTimeSerializer, JsonSerializer, NaiveDateSerializer, SerializerBinding,
    SerializerRegistry, TypeSerializer,
};
