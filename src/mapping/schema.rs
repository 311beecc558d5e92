//! Schema catalog
//!
//! Each entity type declares its columns once through a [`SchemaBuilder`].
//! The catalog validates the declaration on first use and caches the resolved
//! [`TableSchema`] for the lifetime of the session.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

use crate::database::{quote_ident, Primitive, PrimitiveKind, Value};
use crate::error::{CodecError, OrmError, Result, SerializationError};
use crate::mapping::{Entity, Handle, SerializerRegistry};
use crate::session::{load_erased, Session};

/// Loads one referenced row through the session, type-erased
pub(crate) type LoadFn = fn(&Session, i64) -> Result<Option<Rc<dyn Any>>>;

/// The entity type a foreign-key column points at
#[derive(Clone, Copy)]
pub struct ReferenceTarget {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    pub(crate) load: LoadFn,
}

impl ReferenceTarget {
    fn of<U: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<U>(),
            type_name: U::type_name(),
            table: U::TABLE,
            key_column: U::KEY_COLUMN,
            load: load_erased::<U>,
        }
    }
}

impl fmt::Debug for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTarget")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .finish()
    }
}

/// What a column stores
#[derive(Debug, Clone, Copy)]
pub enum DeclaredType {
    /// A primitive field stored as-is
    Primitive(PrimitiveKind),
    /// A domain type stored through its registered serializer
    Serialized {
        domain: TypeId,
        domain_name: &'static str,
    },
    /// Another entity, stored as its primary key
    Reference(ReferenceTarget),
}

/// A field as read from an entity, ready for encoding
pub enum FieldRef<'a> {
    Null,
    Primitive(Value),
    Domain(&'a dyn Any),
    /// Key of the referenced instance, `None` when it is transient
    Reference(Option<i64>),
}

/// A decoded column value, ready to be written into an entity
pub enum FieldValue {
    Primitive(Value),
    Domain(Box<dyn Any>),
    Reference(Rc<dyn Any>),
}

pub(crate) trait FieldAccess<T> {
    fn read<'a>(&self, entity: &'a T) -> FieldRef<'a>;
    fn write(&self, entity: &mut T, value: FieldValue) -> Result<(), CodecError>;
}

struct PrimitiveAccess<T, V> {
    get: fn(&T) -> Option<&V>,
    set: fn(&mut T, V),
}

impl<T, V: Primitive> FieldAccess<T> for PrimitiveAccess<T, V> {
    fn read<'a>(&self, entity: &'a T) -> FieldRef<'a> {
        match (self.get)(entity) {
            Some(v) => FieldRef::Primitive(v.clone().into_value()),
            None => FieldRef::Null,
        }
    }

    fn write(&self, entity: &mut T, value: FieldValue) -> Result<(), CodecError> {
        let value = match value {
            FieldValue::Primitive(v) => v,
            other => return Err(shape_mismatch(V::KIND, &other)),
        };
        let found = value.kind_name();
        let v = V::from_value(value).ok_or(CodecError::TypeMismatch {
            expected: V::KIND,
            found,
        })?;
        (self.set)(entity, v);
        Ok(())
    }
}

struct SerializedAccess<T, D> {
    get: fn(&T) -> Option<&D>,
    set: fn(&mut T, D),
}

impl<T, D: 'static> FieldAccess<T> for SerializedAccess<T, D> {
    fn read<'a>(&self, entity: &'a T) -> FieldRef<'a> {
        match (self.get)(entity) {
            Some(v) => FieldRef::Domain(v),
            None => FieldRef::Null,
        }
    }

    fn write(&self, entity: &mut T, value: FieldValue) -> Result<(), CodecError> {
        let domain = std::any::type_name::<D>();
        let boxed = match value {
            FieldValue::Domain(b) => b,
            _ => {
                return Err(CodecError::Serializer {
                    domain,
                    source: SerializationError::new("expected a deserialized value"),
                })
            }
        };
        let v = boxed.downcast::<D>().map_err(|_| CodecError::Serializer {
            domain,
            source: SerializationError::new("deserialized value has the wrong type"),
        })?;
        (self.set)(entity, *v);
        Ok(())
    }
}

struct ReferenceAccess<T, U> {
    get: fn(&T) -> Option<&Handle<U>>,
    set: fn(&mut T, Handle<U>),
}

impl<T, U: Entity> FieldAccess<T> for ReferenceAccess<T, U> {
    fn read<'a>(&self, entity: &'a T) -> FieldRef<'a> {
        match (self.get)(entity) {
            Some(h) => FieldRef::Reference(h.id()),
            None => FieldRef::Null,
        }
    }

    fn write(&self, entity: &mut T, value: FieldValue) -> Result<(), CodecError> {
        let handle = match value {
            FieldValue::Reference(any) => Handle::<U>::from_any(any),
            _ => None,
        }
        .ok_or(CodecError::TypeMismatch {
            expected: PrimitiveKind::Long,
            found: "non-reference",
        })?;
        (self.set)(entity, handle);
        Ok(())
    }
}

fn shape_mismatch(expected: PrimitiveKind, value: &FieldValue) -> CodecError {
    let found = match value {
        FieldValue::Primitive(v) => v.kind_name(),
        FieldValue::Domain(_) => "domain value",
        FieldValue::Reference(_) => "reference",
    };
    CodecError::TypeMismatch { expected, found }
}

/// One mapped column of an entity type
pub struct ColumnDescriptor<T> {
    name: String,
    declared: DeclaredType,
    access: Box<dyn FieldAccess<T>>,
}

impl<T> ColumnDescriptor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared(&self) -> &DeclaredType {
        &self.declared
    }

    pub(crate) fn read<'a>(&self, entity: &'a T) -> FieldRef<'a> {
        self.access.read(entity)
    }

    pub(crate) fn write(&self, entity: &mut T, value: FieldValue) -> Result<(), CodecError> {
        self.access.write(entity, value)
    }
}

impl<T> fmt::Debug for ColumnDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .finish()
    }
}

/// Collects the column declarations of one entity type
pub struct SchemaBuilder<T> {
    columns: Vec<ColumnDescriptor<T>>,
}

impl<T: 'static> SchemaBuilder<T> {
    fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// A primitive column; a `None` from `get` stores NULL
    pub fn column<V: Primitive>(
        &mut self,
        name: &str,
        get: fn(&T) -> Option<&V>,
        set: fn(&mut T, V),
    ) -> &mut Self {
        self.push(
            name,
            DeclaredType::Primitive(V::KIND),
            PrimitiveAccess { get, set },
        )
    }

    /// A column stored through the serializer registered for `D`
    pub fn serialized<D: 'static>(
        &mut self,
        name: &str,
        get: fn(&T) -> Option<&D>,
        set: fn(&mut T, D),
    ) -> &mut Self {
        self.push(
            name,
            DeclaredType::Serialized {
                domain: TypeId::of::<D>(),
                domain_name: std::any::type_name::<D>(),
            },
            SerializedAccess { get, set },
        )
    }

    /// A foreign-key column holding the primary key of a `U`
    pub fn reference<U: Entity>(
        &mut self,
        name: &str,
        get: fn(&T) -> Option<&Handle<U>>,
        set: fn(&mut T, Handle<U>),
    ) -> &mut Self {
        self.push(
            name,
            DeclaredType::Reference(ReferenceTarget::of::<U>()),
            ReferenceAccess { get, set },
        )
    }

    fn push(
        &mut self,
        name: &str,
        declared: DeclaredType,
        access: impl FieldAccess<T> + 'static,
    ) -> &mut Self {
        self.columns.push(ColumnDescriptor {
            name: name.to_string(),
            declared,
            access: Box::new(access),
        });
        self
    }
}

/// The resolved mapping of one entity type
#[derive(Debug)]
pub struct TableSchema<T> {
    entity: &'static str,
    table: &'static str,
    key_column: &'static str,
    columns: Vec<ColumnDescriptor<T>>,
}

impl<T: Entity> TableSchema<T> {
    fn build() -> Self {
        let mut builder = SchemaBuilder::new();
        T::declare(&mut builder);
        Self {
            entity: T::type_name(),
            table: T::TABLE,
            key_column: T::KEY_COLUMN,
            columns: builder.columns,
        }
    }
}

impl<T> TableSchema<T> {
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn key_column(&self) -> &'static str {
        self.key_column
    }

    pub fn columns(&self) -> &[ColumnDescriptor<T>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor<T>> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// `"Key" = ?`, the predicate used for keyed operations
    pub fn key_selection(&self) -> String {
        format!("{} = ?", quote_ident(self.key_column))
    }

    fn validate(&self, registry: &SerializerRegistry) -> Result<()> {
        if !is_identifier(self.table) {
            return Err(OrmError::schema(
                self.entity,
                format!("invalid table name '{}'", self.table),
            ));
        }
        if !is_identifier(self.key_column) {
            return Err(OrmError::schema(
                self.entity,
                format!("invalid primary key column '{}'", self.key_column),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(OrmError::schema(
                    self.entity,
                    format!("invalid column name '{}'", column.name),
                ));
            }
            if column.name.eq_ignore_ascii_case(self.key_column) {
                return Err(OrmError::schema(
                    self.entity,
                    format!(
                        "column '{}' collides with the primary key column",
                        column.name
                    ),
                ));
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(OrmError::schema(
                    self.entity,
                    format!("duplicate column '{}'", column.name),
                ));
            }
            if let DeclaredType::Serialized {
                domain,
                domain_name,
            } = column.declared
            {
                if registry.lookup(domain).is_none() {
                    return Err(OrmError::schema(
                        self.entity,
                        format!(
                            "column '{}' has type {} with no registered serializer",
                            column.name, domain_name
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this mapping
    pub fn create_table_sql(&self, registry: &SerializerRegistry) -> Result<String> {
        let mut defs = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_ident(self.key_column)
        )];

        for column in &self.columns {
            let ty = match column.declared {
                DeclaredType::Primitive(kind) => kind.sql_type().to_string(),
                DeclaredType::Serialized {
                    domain,
                    domain_name,
                } => registry
                    .lookup(domain)
                    .map(|b| b.serialized_type().sql_type().to_string())
                    .ok_or_else(|| {
                        OrmError::schema(
                            self.entity,
                            format!("no serializer registered for {}", domain_name),
                        )
                    })?,
                DeclaredType::Reference(target) => format!(
                    "INTEGER REFERENCES {}({})",
                    quote_ident(target.table),
                    quote_ident(target.key_column)
                ),
            };
            defs.push(format!("{} {}", quote_ident(&column.name), ty));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(self.table),
            defs.join(", ")
        ))
    }

    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(self.table))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Per-type cache of resolved schemas
#[derive(Default)]
pub struct SchemaCatalog {
    schemas: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the schema of `T`, validating it on first use
    ///
    /// Failed resolutions are not cached.
    pub fn resolve<T: Entity>(&self, registry: &SerializerRegistry) -> Result<Rc<TableSchema<T>>> {
        let cached = self.schemas.borrow().get(&TypeId::of::<T>()).cloned();
        if let Some(any) = cached {
            if let Ok(schema) = any.downcast::<TableSchema<T>>() {
                return Ok(schema);
            }
        }

        let schema = TableSchema::<T>::build();
        schema.validate(registry)?;
        debug!(
            entity = schema.entity,
            table = schema.table,
            columns = schema.columns.len(),
            "resolved schema"
        );

        let schema = Rc::new(schema);
        self.schemas
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::clone(&schema) as Rc<dyn Any>);
        Ok(schema)
    }

    pub fn contains<T: Entity>(&self) -> bool {
        self.schemas.borrow().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.schemas.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.borrow().is_empty()
    }

    /// Forget every resolved schema
    pub fn clear(&self) {
        self.schemas.borrow_mut().clear();
    }
}

impl fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("resolved", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{
        fixture_registry, Article, BadKey, DuplicateColumn, Gadget, InvalidName, Node, Note,
        Sample,
    };

    #[test]
    fn test_resolve_note() {
        let catalog = SchemaCatalog::new();
        let registry = SerializerRegistry::new();
        let schema = catalog.resolve::<Note>(&registry).unwrap();

        assert_eq!(schema.table(), "Notes");
        assert_eq!(schema.key_column(), "Id");
        assert_eq!(schema.entity(), "Note");
        let names: Vec<_> = schema.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["title", "pinned"]);
        assert!(matches!(
            schema.column("TITLE").unwrap().declared(),
            DeclaredType::Primitive(PrimitiveKind::Text)
        ));
        assert_eq!(schema.key_selection(), "\"Id\" = ?");
    }

    #[test]
    fn test_resolve_is_cached() {
        let catalog = SchemaCatalog::new();
        let registry = SerializerRegistry::new();
        let a = catalog.resolve::<Note>(&registry).unwrap();
        let b = catalog.resolve::<Note>(&registry).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(catalog.contains::<Note>());
        assert_eq!(catalog.len(), 1);

        catalog.clear();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_reference_column() {
        let catalog = SchemaCatalog::new();
        let schema = catalog.resolve::<Article>(&fixture_registry()).unwrap();
        match schema.column("author").unwrap().declared() {
            DeclaredType::Reference(target) => {
                assert_eq!(target.table, "Authors");
                assert_eq!(target.type_name, "Author");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_schema_errors() {
        let catalog = SchemaCatalog::new();
        let registry = SerializerRegistry::with_defaults();

        let err = catalog.resolve::<DuplicateColumn>(&registry).unwrap_err();
        assert!(err.to_string().contains("duplicate column 'Name'"));

        let err = catalog.resolve::<BadKey>(&registry).unwrap_err();
        assert!(err.to_string().contains("collides with the primary key"));

        let err = catalog.resolve::<InvalidName>(&registry).unwrap_err();
        assert!(err.to_string().contains("invalid column name"));

        let err = catalog.resolve::<Gadget>(&registry).unwrap_err();
        assert!(matches!(err, OrmError::Schema { entity: "Gadget", .. }));
        assert!(err.to_string().contains("no registered serializer"));
        assert!(!catalog.contains::<Gadget>());
    }

    #[test]
    fn test_article_needs_registered_serializers() {
        let catalog = SchemaCatalog::new();
        // the JSON column of Article is only registered by the fixture helper
        assert!(catalog
            .resolve::<Article>(&SerializerRegistry::new())
            .is_err());
    }

    #[test]
    fn test_create_table_sql() {
        let registry = SerializerRegistry::with_defaults();
        let catalog = SchemaCatalog::new();

        let sql = catalog
            .resolve::<Note>(&registry)
            .unwrap()
            .create_table_sql(&registry)
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"Notes\" (\"Id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"title\" TEXT, \"pinned\" INTEGER)"
        );

        let node = catalog.resolve::<Node>(&registry).unwrap();
        let sql = node.create_table_sql(&registry).unwrap();
        assert!(sql.contains("\"parent\" INTEGER REFERENCES \"Nodes\"(\"Id\")"));
        assert_eq!(node.drop_table_sql(), "DROP TABLE IF EXISTS \"Nodes\"");

        let sample = catalog.resolve::<Sample>(&registry).unwrap();
        let sql = sample.create_table_sql(&registry).unwrap();
        assert!(sql.contains("\"ratio\" REAL"));
        assert!(sql.contains("\"grade\" TEXT"));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("Notes"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a b"));
        assert!(!is_identifier("a;drop"));
    }
}
