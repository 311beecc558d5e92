//! Sessions
//!
//! A [`Session`] is one unit of work: it owns the driver, the serializer
//! registry, the schema catalog and the identity cache. Sessions share
//! nothing with each other and are not `Send`; use one per thread.
//!
//! Hydration registers each new instance in the identity cache before its
//! fields are filled in, so foreign-key cycles resolve to the instance
//! already under construction instead of recursing. References are strong
//! [`Handle`]s, so a loaded cycle keeps itself alive until one of its links
//! is cleared.

mod gateway;

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

use crate::config::RowboundConfig;
use crate::database::{DatabaseConn, Driver, Row};
use crate::error::{ErrorPolicy, OrmError, Result};
use crate::mapping::codec::decode_column;
use crate::mapping::{
    Entity, Handle, IdentityCache, ReferenceTarget, SchemaCatalog, SerializerBinding,
    SerializerRegistry, TableSchema, TypeSerializer,
};

/// Default bound on nested foreign-key loads
pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// How per-field and per-row conversion failures are handled
    pub policy: ErrorPolicy,
    /// How many foreign-key loads may nest inside one operation
    pub max_reference_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy: ErrorPolicy::Strict,
            max_reference_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }
}

impl From<&RowboundConfig> for SessionOptions {
    fn from(config: &RowboundConfig) -> Self {
        Self {
            policy: config.error_policy,
            max_reference_depth: config.max_reference_depth,
        }
    }
}

pub struct Session {
    driver: Box<dyn Driver>,
    registry: SerializerRegistry,
    catalog: SchemaCatalog,
    cache: IdentityCache,
    options: SessionOptions,
    depth: Cell<usize>,
    /// Referenced keys found absent during the current hydration pass
    missing: RefCell<HashSet<(TypeId, i64)>>,
}

impl Session {
    /// A session over `driver` with default options and the built-in serializers
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self::with_options(driver, SessionOptions::default())
    }

    pub fn with_options(driver: impl Driver + 'static, options: SessionOptions) -> Self {
        Self {
            driver: Box::new(driver),
            registry: SerializerRegistry::with_defaults(),
            catalog: SchemaCatalog::new(),
            cache: IdentityCache::new(),
            options,
            depth: Cell::new(0),
            missing: RefCell::new(HashSet::new()),
        }
    }

    /// Open the configured database file
    pub fn open(config: &RowboundConfig) -> Result<Self> {
        let path = config.sqlite_path();
        let conn = DatabaseConn::open_with(Some(path.as_str()), config.foreign_keys)?;
        Ok(Self::with_options(conn, SessionOptions::from(config)))
    }

    /// A session over a fresh in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConn::open_in_memory()?))
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    /// Register a serializer, returning the binding it replaced
    ///
    /// Resolved schemas are dropped so the next use validates against the
    /// updated registry.
    pub fn register_serializer<S: TypeSerializer>(
        &mut self,
        serializer: S,
    ) -> Option<SerializerBinding> {
        let replaced = self.registry.register(serializer);
        self.catalog.clear();
        replaced
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Resolved schema of `T`
    pub fn schema<T: Entity>(&self) -> Result<Rc<TableSchema<T>>> {
        self.catalog.resolve::<T>(&self.registry)
    }

    /// Create the table of `T` if it does not exist yet
    pub fn create_table<T: Entity>(&self) -> Result<()> {
        let schema = self.schema::<T>()?;
        let sql = schema.create_table_sql(&self.registry)?;
        self.driver.execute(&sql, &[])?;
        info!(table = schema.table(), "created table");
        Ok(())
    }

    pub fn drop_table<T: Entity>(&self) -> Result<()> {
        let schema = self.schema::<T>()?;
        self.driver.execute(&schema.drop_table_sql(), &[])?;
        info!(table = schema.table(), "dropped table");
        Ok(())
    }

    // =========================================================================
    // Hydration
    // =========================================================================

    /// Resolve a foreign key: the cached instance if any, otherwise one load
    ///
    /// A key already found absent in this hydration pass is not fetched again.
    pub(crate) fn resolve_reference(
        &self,
        target: &ReferenceTarget,
        key: i64,
    ) -> Result<Option<Rc<dyn Any>>> {
        if let Some(hit) = self.cache.get_erased(target.type_id, key) {
            return Ok(Some(hit));
        }
        if self.missing.borrow().contains(&(target.type_id, key)) {
            return Ok(None);
        }

        let depth = self.depth.get();
        if depth >= self.options.max_reference_depth {
            return Err(OrmError::ReferenceDepthExceeded {
                entity: target.type_name,
                key,
                limit: self.options.max_reference_depth,
            });
        }

        debug!(entity = target.type_name, key, depth, "load reference");
        self.depth.set(depth + 1);
        let loaded = (target.load)(self, key);
        self.depth.set(depth);
        if let Ok(None) = loaded {
            self.missing.borrow_mut().insert((target.type_id, key));
        }
        loaded
    }

    /// Turn fetched rows into live instances
    ///
    /// Under the lenient policy a row that fails to convert is logged and the
    /// call yields no results; driver and state errors always propagate.
    pub(crate) fn hydrate<T: Entity>(&self, rows: Vec<Row>) -> Result<Vec<Handle<T>>> {
        let outermost = self.depth.get() == 0;
        let hydrated = self.hydrate_rows(rows);
        if outermost {
            self.missing.borrow_mut().clear();
        }
        hydrated
    }

    fn hydrate_rows<T: Entity>(&self, rows: Vec<Row>) -> Result<Vec<Handle<T>>> {
        let schema = self.schema::<T>()?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.hydrate_row(&schema, row) {
                Ok(handle) => out.push(handle),
                Err(e) if self.options.policy == ErrorPolicy::Lenient && e.is_conversion() => {
                    error!(
                        entity = T::type_name(),
                        error = %e,
                        "failed to hydrate row, discarding {} rows",
                        rows.len()
                    );
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// A row without the key column yields a transient, uncached instance
    fn hydrate_row<T: Entity>(&self, schema: &TableSchema<T>, row: &Row) -> Result<Handle<T>> {
        let key_column = schema.key_column();
        let Some(index) = row.column_index(key_column) else {
            let handle = Handle::new(T::default());
            self.apply_row(schema, &handle, row)?;
            return Ok(handle);
        };
        let key = row
            .get_long(index)
            .map_err(|source| OrmError::Serialization {
                entity: T::type_name(),
                column: key_column.to_string(),
                source,
            })?;

        if let Some(cached) = self.cache.get::<T>(key) {
            self.apply_row(schema, &cached, row)?;
            return Ok(cached);
        }

        let handle = Handle::with_id(T::default(), Some(key));
        self.cache.add(&handle)?;
        if let Err(e) = self.apply_row(schema, &handle, row) {
            self.cache.remove(&handle);
            return Err(e);
        }
        Ok(handle)
    }

    /// Decode every column first, then write them under one borrow
    fn apply_row<T: Entity>(
        &self,
        schema: &TableSchema<T>,
        handle: &Handle<T>,
        row: &Row,
    ) -> Result<()> {
        let mut decoded = Vec::with_capacity(schema.columns().len());
        for column in schema.columns() {
            match decode_column(self, column, row) {
                Ok(Some(value)) => decoded.push((column, value)),
                Ok(None) => {}
                Err(e) => self.tolerate(e)?,
            }
        }

        let mut entity = handle.try_write()?;
        for (column, value) in decoded {
            if let Err(source) = column.write(&mut *entity, value) {
                self.tolerate(OrmError::Serialization {
                    entity: T::type_name(),
                    column: column.name().to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Skip a field-level conversion failure when the policy allows it
    pub(crate) fn tolerate(&self, err: OrmError) -> Result<()> {
        match (&self.options.policy, &err) {
            (ErrorPolicy::Lenient, OrmError::Serialization { .. }) => {
                warn!(error = %err, "skipping field");
                Ok(())
            }
            _ => Err(err),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("catalog", &self.catalog)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Type-erased `load`, used to resolve references to `U`
pub(crate) fn load_erased<U: Entity>(session: &Session, key: i64) -> Result<Option<Rc<dyn Any>>> {
    Ok(session.load::<U>(key)?.map(Handle::into_any))
}
