//! Record lifecycle operations
//!
//! Every operation issues one statement through the driver. Saves always
//! write the full row; there is no dirty tracking.

use std::any::TypeId;
use tracing::{debug, warn};

use crate::database::{quote_ident, ContentValues, Query, Value};
use crate::error::{OrmError, Result};
use crate::mapping::codec::encode_column;
use crate::mapping::{DeclaredType, Entity, Handle, TableSchema};
use crate::session::Session;

impl Session {
    /// Insert a transient instance or update a persisted one, returning its key
    ///
    /// The first save adopts the key chosen by the driver and registers the
    /// instance in the identity cache.
    pub fn save<T: Entity>(&self, handle: &Handle<T>) -> Result<i64> {
        if handle.is_orphaned() {
            return Err(OrmError::invalid_state(format!(
                "cannot save deleted {}",
                handle.describe()
            )));
        }

        let schema = self.schema::<T>()?;
        let values = self.encode_values(&schema, handle)?;

        match handle.id() {
            None => {
                let key = self.driver.insert(schema.table(), &values)?;
                // a stale instance can only be left over from a row removed behind our back
                if let Some(stale) = self.cache.evict::<T>(key) {
                    stale.mark_orphaned();
                }
                handle.assign_id(key);
                self.cache.add(handle)?;
                debug!(entity = T::type_name(), key, "inserted");
                Ok(key)
            }
            Some(key) => {
                let updated = self.driver.update(
                    schema.table(),
                    &values,
                    &schema.key_selection(),
                    &[Value::Long(key)],
                )?;
                if updated == 0 && !values.is_empty() {
                    warn!(
                        entity = T::type_name(),
                        key, "update matched no rows, the row may have been deleted"
                    );
                }
                if self.cache.get::<T>(key).is_none() {
                    self.cache.add(handle)?;
                }
                debug!(entity = T::type_name(), key, updated, "updated");
                Ok(key)
            }
        }
    }

    /// Delete the row behind `handle`
    ///
    /// The instance leaves the identity cache and becomes orphaned: still
    /// readable, no longer tied to storage.
    pub fn delete<T: Entity>(&self, handle: &Handle<T>) -> Result<()> {
        if handle.is_orphaned() {
            return Err(OrmError::invalid_state(format!(
                "{} was already deleted",
                handle.describe()
            )));
        }
        let key = handle.id().ok_or_else(|| {
            OrmError::invalid_state(format!("cannot delete {}", handle.describe()))
        })?;

        let schema = self.schema::<T>()?;
        let deleted = self.driver.delete(
            schema.table(),
            Some(&schema.key_selection()),
            &[Value::Long(key)],
        )?;
        self.cache.remove(handle);
        handle.mark_orphaned();
        debug!(entity = T::type_name(), key, deleted, "deleted");
        Ok(())
    }

    /// Delete the row with key `id`, returning whether a row was removed
    pub fn delete_by_id<T: Entity>(&self, id: i64) -> Result<bool> {
        let schema = self.schema::<T>()?;
        let deleted = self.driver.delete(
            schema.table(),
            Some(&schema.key_selection()),
            &[Value::Long(id)],
        )?;
        if let Some(evicted) = self.cache.evict::<T>(id) {
            evicted.mark_orphaned();
        }
        Ok(deleted > 0)
    }

    /// Delete every row matching `where_clause` (all rows for `None`)
    ///
    /// Cached instances of the deleted rows are not evicted.
    pub fn delete_where<T: Entity>(&self, where_clause: Option<&str>, args: &[Value]) -> Result<usize> {
        let schema = self.schema::<T>()?;
        Ok(self.driver.delete(schema.table(), where_clause, args)?)
    }

    /// Load the instance with key `id`
    pub fn load<T: Entity>(&self, id: i64) -> Result<Option<Handle<T>>> {
        let schema = self.schema::<T>()?;
        self.query_single(Query::new().selection(schema.key_selection(), [Value::Long(id)]))
    }

    /// The instance with the smallest key
    pub fn first<T: Entity>(&self) -> Result<Option<Handle<T>>> {
        let schema = self.schema::<T>()?;
        self.query_single(Query::new().order_by(format!("{} ASC", quote_ident(schema.key_column()))))
    }

    /// The instance with the largest key
    pub fn last<T: Entity>(&self) -> Result<Option<Handle<T>>> {
        let schema = self.schema::<T>()?;
        self.query_single(Query::new().order_by(format!("{} DESC", quote_ident(schema.key_column()))))
    }

    pub fn query<T: Entity>(&self, query: &Query) -> Result<Vec<Handle<T>>> {
        let schema = self.schema::<T>()?;
        let rows = self.driver.query(schema.table(), query)?;
        self.hydrate(rows)
    }

    /// First result of `query`; any limit it carries is replaced by 1
    pub fn query_single<T: Entity>(&self, query: Query) -> Result<Option<Handle<T>>> {
        let rows = self.query::<T>(&query.limit(1))?;
        Ok(rows.into_iter().next())
    }

    /// Hydrate `T` from caller-supplied SQL
    ///
    /// The statement must select the key column of `T`.
    pub fn raw_query<T: Entity>(&self, sql: &str, args: &[Value]) -> Result<Vec<Handle<T>>> {
        let rows = self.driver.raw_query(sql, args)?;
        self.hydrate(rows)
    }

    pub fn raw_query_single<T: Entity>(&self, sql: &str, args: &[Value]) -> Result<Option<Handle<T>>> {
        let rows = self.driver.raw_query(sql, args)?;
        let first = rows.into_iter().take(1).collect();
        Ok(self.hydrate(first)?.into_iter().next())
    }

    /// Instances of `U` whose `foreign_key` column points at `owner`
    pub fn get_many<T: Entity, U: Entity>(
        &self,
        owner: &Handle<T>,
        foreign_key: &str,
    ) -> Result<Vec<Handle<U>>> {
        let key = owner.id().ok_or_else(|| {
            OrmError::invalid_state(format!(
                "cannot look up rows related to {}",
                owner.describe()
            ))
        })?;

        let schema = self.schema::<U>()?;
        let column = schema.column(foreign_key).ok_or_else(|| {
            OrmError::schema(
                U::type_name(),
                format!("unknown foreign key column '{}'", foreign_key),
            )
        })?;
        match column.declared() {
            DeclaredType::Reference(target) if target.type_id == TypeId::of::<T>() => {}
            _ => {
                return Err(OrmError::schema(
                    U::type_name(),
                    format!(
                        "column '{}' does not reference {}",
                        column.name(),
                        T::type_name()
                    ),
                ))
            }
        }

        self.query(
            &Query::new()
                .selection(format!("{} = ?", quote_ident(column.name())), [Value::Long(key)])
                .order_by(format!("{} ASC", quote_ident(schema.key_column()))),
        )
    }

    fn encode_values<T: Entity>(
        &self,
        schema: &TableSchema<T>,
        handle: &Handle<T>,
    ) -> Result<ContentValues> {
        let entity = handle.try_read()?;
        let mut values = ContentValues::new();
        for column in schema.columns() {
            match encode_column(column, &entity, &self.registry) {
                Ok(value) => values.put(column.name(), value),
                Err(source) => self.tolerate(OrmError::Serialization {
                    entity: T::type_name(),
                    column: column.name().to_string(),
                    source,
                })?,
            }
        }
        Ok(values)
    }
}

impl<T: Entity> Handle<T> {
    /// Table holding rows of this type
    pub fn table_name(&self) -> &'static str {
        T::TABLE
    }

    /// Shorthand for [`Session::save`]
    pub fn save(&self, session: &Session) -> Result<i64> {
        session.save(self)
    }

    /// Shorthand for [`Session::delete`]
    pub fn delete(&self, session: &Session) -> Result<()> {
        session.delete(self)
    }

    /// Shorthand for [`Session::get_many`]
    pub fn get_many<U: Entity>(&self, session: &Session, foreign_key: &str) -> Result<Vec<Handle<U>>> {
        session.get_many::<T, U>(self, foreign_key)
    }
}
