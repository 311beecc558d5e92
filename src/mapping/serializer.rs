//! Serializer registry
//!
//! Field types that are neither primitives nor entities are stored through a
//! registered [`TypeSerializer`], looked up by the exact domain type. There is
//! no fallback to a supertype or a similar type: a column whose domain type
//! has no binding fails schema resolution.

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::debug;

use crate::database::{PrimitiveKind, Value};
use crate::error::SerializationError;

/// Bidirectional converter between a domain type and one primitive kind
///
/// Implementations must satisfy `deserialize(serialize(v)) == v`.
pub trait TypeSerializer: 'static {
    type Domain: 'static;

    /// Kind of the values `serialize` produces and `deserialize` accepts
    fn serialized_type(&self) -> PrimitiveKind;

    /// Convert to storage; `Value::Null` stores NULL
    fn serialize(&self, value: &Self::Domain) -> Result<Value, SerializationError>;

    fn deserialize(&self, value: Value) -> Result<Self::Domain, SerializationError>;
}

trait ErasedSerializer {
    fn serialized_type(&self) -> PrimitiveKind;
    fn serialize_any(&self, value: &dyn Any) -> Result<Value, SerializationError>;
    fn deserialize_any(&self, value: Value) -> Result<Box<dyn Any>, SerializationError>;
}

impl<S: TypeSerializer> ErasedSerializer for S {
    fn serialized_type(&self) -> PrimitiveKind {
        TypeSerializer::serialized_type(self)
    }

    fn serialize_any(&self, value: &dyn Any) -> Result<Value, SerializationError> {
        let value = value.downcast_ref::<S::Domain>().ok_or_else(|| {
            SerializationError::new(format!(
                "value is not a {}",
                std::any::type_name::<S::Domain>()
            ))
        })?;
        self.serialize(value)
    }

    fn deserialize_any(&self, value: Value) -> Result<Box<dyn Any>, SerializationError> {
        Ok(Box::new(self.deserialize(value)?))
    }
}

/// A registered serializer together with its domain type
#[derive(Clone)]
pub struct SerializerBinding {
    domain: TypeId,
    domain_name: &'static str,
    inner: Rc<dyn ErasedSerializer>,
}

impl SerializerBinding {
    pub fn domain(&self) -> TypeId {
        self.domain
    }

    pub fn domain_name(&self) -> &'static str {
        self.domain_name
    }

    pub fn serialized_type(&self) -> PrimitiveKind {
        self.inner.serialized_type()
    }

    pub(crate) fn serialize(&self, value: &dyn Any) -> Result<Value, SerializationError> {
        self.inner.serialize_any(value)
    }

    pub(crate) fn deserialize(&self, value: Value) -> Result<Box<dyn Any>, SerializationError> {
        self.inner.deserialize_any(value)
    }
}

impl std::fmt::Debug for SerializerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerBinding")
            .field("domain", &self.domain_name)
            .field("serialized_type", &self.serialized_type())
            .finish()
    }
}

/// Table of domain type → serializer bindings
#[derive(Debug, Clone, Default)]
pub struct SerializerRegistry {
    bindings: HashMap<TypeId, SerializerBinding>,
}

impl SerializerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in date serializers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DateTimeSerializer);
        registry.register(NaiveDateSerializer);
        registry
    }

    /// Register a serializer, returning the binding it replaced
    pub fn register<S: TypeSerializer>(&mut self, serializer: S) -> Option<SerializerBinding> {
        let binding = SerializerBinding {
            domain: TypeId::of::<S::Domain>(),
            domain_name: std::any::type_name::<S::Domain>(),
            inner: Rc::new(serializer),
        };
        debug!(
            domain = binding.domain_name,
            serialized = %binding.serialized_type(),
            "register serializer"
        );
        self.bindings.insert(binding.domain, binding)
    }

    pub fn lookup(&self, domain: TypeId) -> Option<&SerializerBinding> {
        self.bindings.get(&domain)
    }

    pub fn lookup_for<D: 'static>(&self) -> Option<&SerializerBinding> {
        self.lookup(TypeId::of::<D>())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// `DateTime<Utc>` as milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeSerializer;

impl TypeSerializer for DateTimeSerializer {
    type Domain = DateTime<Utc>;

    fn serialized_type(&self) -> PrimitiveKind {
        PrimitiveKind::Long
    }

    fn serialize(&self, value: &DateTime<Utc>) -> Result<Value, SerializationError> {
        Ok(Value::Long(value.timestamp_millis()))
    }

    fn deserialize(&self, value: Value) -> Result<DateTime<Utc>, SerializationError> {
        match value {
            Value::Long(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| SerializationError::new(format!("timestamp {} out of range", ms))),
            other => Err(SerializationError::new(format!(
                "expected long, found {}",
                other.kind_name()
            ))),
        }
    }
}

/// `NaiveDate` as `YYYY-MM-DD` text, which keeps dates sortable
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveDateSerializer;

impl TypeSerializer for NaiveDateSerializer {
    type Domain = NaiveDate;

    fn serialized_type(&self) -> PrimitiveKind {
        PrimitiveKind::Text
    }

    fn serialize(&self, value: &NaiveDate) -> Result<Value, SerializationError> {
        Ok(Value::Text(value.format("%Y-%m-%d").to_string()))
    }

    fn deserialize(&self, value: Value) -> Result<NaiveDate, SerializationError> {
        match value {
            Value::Text(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| SerializationError::new(format!("invalid date '{}': {}", s, e))),
            other => Err(SerializationError::new(format!(
                "expected text, found {}",
                other.kind_name()
            ))),
        }
    }
}

/// Any serde type as JSON text
///
/// ```rust
/// use rowbound::{JsonSerializer, SerializerRegistry};
///
/// let mut registry = SerializerRegistry::new();
/// registry.register(JsonSerializer::<Vec<String>>::new());
/// assert!(registry.lookup_for::<Vec<String>>().is_some());
/// ```
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeSerializer for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    type Domain = T;

    fn serialized_type(&self) -> PrimitiveKind {
        PrimitiveKind::Text
    }

    fn serialize(&self, value: &T) -> Result<Value, SerializationError> {
        serde_json::to_string(value)
            .map(Value::Text)
            .map_err(|e| SerializationError::new(e.to_string()))
    }

    fn deserialize(&self, value: Value) -> Result<T, SerializationError> {
        match value {
            Value::Text(s) => {
                serde_json::from_str(&s).map_err(|e| SerializationError::new(e.to_string()))
            }
            other => Err(SerializationError::new(format!(
                "expected text, found {}",
                other.kind_name()
            ))),
        }
    }
}
