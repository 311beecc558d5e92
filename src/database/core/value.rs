//! Storage primitives
//!
//! Every mapped field ends up as one of a closed set of primitive kinds. Both
//! directions of the codec match exhaustively on [`PrimitiveKind`], so adding a
//! kind is a compile error everywhere it has to be handled.

use rusqlite::types::{ToSql, ToSqlOutput};
use std::fmt;

/// The primitive kinds a column can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Text,
    Bool,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// A single character, stored as one-character text
    Char,
}

impl PrimitiveKind {
    /// SQLite column type used when generating table definitions
    pub fn sql_type(&self) -> &'static str {
        match self {
            PrimitiveKind::Text | PrimitiveKind::Char => "TEXT",
            PrimitiveKind::Bool
            | PrimitiveKind::Short
            | PrimitiveKind::Int
            | PrimitiveKind::Long => "INTEGER",
            PrimitiveKind::Float | PrimitiveKind::Double => "REAL",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Text => "text",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Char => "char",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A nullable primitive value as written to or read from a column
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
}

impl Value {
    /// Kind of a non-null value
    pub fn kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Null => None,
            Value::Text(_) => Some(PrimitiveKind::Text),
            Value::Bool(_) => Some(PrimitiveKind::Bool),
            Value::Short(_) => Some(PrimitiveKind::Short),
            Value::Int(_) => Some(PrimitiveKind::Int),
            Value::Long(_) => Some(PrimitiveKind::Long),
            Value::Float(_) => Some(PrimitiveKind::Float),
            Value::Double(_) => Some(PrimitiveKind::Double),
            Value::Char(_) => Some(PrimitiveKind::Char),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value's kind, `"null"` for [`Value::Null`]
    pub fn kind_name(&self) -> &'static str {
        self.kind().map(|k| k.name()).unwrap_or("null")
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqlValue;

        let out = match self {
            Value::Null => SqlValue::Null,
            Value::Text(s) => return Ok(ToSqlOutput::from(s.as_str())),
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Short(v) => SqlValue::Integer(i64::from(*v)),
            Value::Int(v) => SqlValue::Integer(i64::from(*v)),
            Value::Long(v) => SqlValue::Integer(*v),
            Value::Float(v) => SqlValue::Real(f64::from(*v)),
            Value::Double(v) => SqlValue::Real(*v),
            Value::Char(c) => SqlValue::Text(c.to_string()),
        };
        Ok(ToSqlOutput::Owned(out))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Rust types that map directly onto a [`PrimitiveKind`]
pub trait Primitive: Clone + 'static {
    const KIND: PrimitiveKind;

    fn into_value(self) -> Value;

    /// Extract from a value of exactly this kind
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! primitive {
    ($ty:ty, $kind:ident) => {
        impl Primitive for $ty {
            const KIND: PrimitiveKind = PrimitiveKind::$kind;

            fn into_value(self) -> Value {
                Value::$kind(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$kind(v)
            }
        }
    };
}

primitive!(String, Text);
primitive!(bool, Bool);
primitive!(i16, Short);
primitive!(i32, Int);
primitive!(i64, Long);
primitive!(f32, Float);
primitive!(f64, Double);
primitive!(char, Char);

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value as SqlValue;

    fn sql(value: &Value) -> SqlValue {
        match value.to_sql().unwrap() {
            ToSqlOutput::Owned(v) => v,
            ToSqlOutput::Borrowed(v) => v.into(),
            _ => panic!("unexpected output"),
        }
    }

    #[test]
    fn test_storage_representation() {
        assert_eq!(sql(&Value::Bool(true)), SqlValue::Integer(1));
        assert_eq!(sql(&Value::Bool(false)), SqlValue::Integer(0));
        assert_eq!(sql(&Value::Short(-3)), SqlValue::Integer(-3));
        assert_eq!(sql(&Value::Char('z')), SqlValue::Text("z".to_string()));
        assert_eq!(sql(&Value::Float(1.5)), SqlValue::Real(1.5));
        assert_eq!(sql(&Value::from("hi")), SqlValue::Text("hi".to_string()));
        assert_eq!(sql(&Value::Null), SqlValue::Null);
    }

    #[test]
    fn test_kind() {
        assert_eq!(Value::Long(1).kind(), Some(PrimitiveKind::Long));
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(4i32)), Value::Int(4));
    }

    #[test]
    fn test_primitive_extraction() {
        assert_eq!(String::from_value(Value::from("a")), Some("a".to_string()));
        assert_eq!(i32::from_value(Value::Long(1)), None);
        assert_eq!(<char as Primitive>::KIND, PrimitiveKind::Char);
        assert_eq!(PrimitiveKind::Char.sql_type(), "TEXT");
        assert_eq!(PrimitiveKind::Bool.sql_type(), "INTEGER");
    }
}
