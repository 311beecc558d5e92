//! Value codec
//!
//! Encoding turns a field into the [`Value`] written to its column; decoding
//! reads a row cell back into a field. Both directions go through the same
//! per-kind tables ([`check_kind`] and [`read_cell`]) so every primitive kind
//! round-trips.
//!
//! Floating point policy: ±infinity round-trips, NaN is rejected on encode
//! because SQLite would silently store it as NULL.

use tracing::warn;

use crate::database::{PrimitiveKind, Row, Value};
use crate::error::{CodecError, OrmError, Result};
use crate::mapping::schema::{ColumnDescriptor, DeclaredType, FieldRef, FieldValue};
use crate::mapping::{Entity, SerializerRegistry};
use crate::session::Session;

/// Encode one field for its declared column type
pub fn encode(
    declared: &DeclaredType,
    field: FieldRef<'_>,
    registry: &SerializerRegistry,
) -> Result<Value, CodecError> {
    match (declared, field) {
        (_, FieldRef::Null) => Ok(Value::Null),
        (
            DeclaredType::Serialized {
                domain,
                domain_name,
            },
            FieldRef::Domain(value),
        ) => {
            let binding = registry
                .lookup(*domain)
                .ok_or(CodecError::MissingSerializer {
                    domain: *domain_name,
                })?;
            let stored = binding
                .serialize(value)
                .map_err(|source| CodecError::Serializer {
                    domain: *domain_name,
                    source,
                })?;
            check_kind(binding.serialized_type(), stored)
        }
        (DeclaredType::Primitive(kind), FieldRef::Primitive(value)) => check_kind(*kind, value),
        (DeclaredType::Reference(target), FieldRef::Reference(key)) => key
            .map(Value::Long)
            .ok_or(CodecError::UnsavedReference {
                target: target.type_name,
            }),
        (declared, field) => Err(CodecError::TypeMismatch {
            expected: storage_kind(declared, registry),
            found: match field {
                FieldRef::Null => "null",
                FieldRef::Primitive(v) => v.kind_name(),
                FieldRef::Domain(_) => "domain value",
                FieldRef::Reference(_) => "reference",
            },
        }),
    }
}

/// Check that a value matches the kind its column stores
pub fn check_kind(kind: PrimitiveKind, value: Value) -> Result<Value, CodecError> {
    let matches = match kind {
        PrimitiveKind::Text => matches!(value, Value::Text(_) | Value::Null),
        PrimitiveKind::Bool => matches!(value, Value::Bool(_) | Value::Null),
        PrimitiveKind::Short => matches!(value, Value::Short(_) | Value::Null),
        PrimitiveKind::Int => matches!(value, Value::Int(_) | Value::Null),
        PrimitiveKind::Long => matches!(value, Value::Long(_) | Value::Null),
        PrimitiveKind::Float => match value {
            Value::Float(f) if f.is_nan() => return Err(CodecError::NotANumber),
            Value::Float(_) | Value::Null => true,
            _ => false,
        },
        PrimitiveKind::Double => match value {
            Value::Double(f) if f.is_nan() => return Err(CodecError::NotANumber),
            Value::Double(_) | Value::Null => true,
            _ => false,
        },
        PrimitiveKind::Char => matches!(value, Value::Char(_) | Value::Null),
    };

    if matches {
        Ok(value)
    } else {
        Err(CodecError::TypeMismatch {
            expected: kind,
            found: value.kind_name(),
        })
    }
}

/// Read a non-null cell with the row accessor for `kind`
pub fn read_cell(row: &Row, index: usize, kind: PrimitiveKind) -> Result<Value, CodecError> {
    Ok(match kind {
        PrimitiveKind::Text => Value::Text(row.get_string(index)?),
        PrimitiveKind::Bool => Value::Bool(row.get_bool(index)?),
        PrimitiveKind::Short => Value::Short(row.get_short(index)?),
        PrimitiveKind::Int => Value::Int(row.get_int(index)?),
        PrimitiveKind::Long => Value::Long(row.get_long(index)?),
        PrimitiveKind::Float => Value::Float(row.get_float(index)?),
        PrimitiveKind::Double => Value::Double(row.get_double(index)?),
        PrimitiveKind::Char => Value::Char(row.get_char(index)?),
    })
}

fn storage_kind(declared: &DeclaredType, registry: &SerializerRegistry) -> PrimitiveKind {
    match declared {
        DeclaredType::Primitive(kind) => *kind,
        DeclaredType::Serialized { domain, .. } => registry
            .lookup(*domain)
            .map(|b| b.serialized_type())
            .unwrap_or(PrimitiveKind::Text),
        DeclaredType::Reference(_) => PrimitiveKind::Long,
    }
}

/// Encode the column of `entity` described by `column`
pub(crate) fn encode_column<T: Entity>(
    column: &ColumnDescriptor<T>,
    entity: &T,
    registry: &SerializerRegistry,
) -> Result<Value, CodecError> {
    encode(column.declared(), column.read(entity), registry)
}

/// Decode the cell for `column` from `row`
///
/// Returns `Ok(None)` when the field must be left untouched: the column is
/// absent from the row, the cell is NULL, or a referenced row does not exist.
pub(crate) fn decode_column<T: Entity>(
    session: &Session,
    column: &ColumnDescriptor<T>,
    row: &Row,
) -> Result<Option<FieldValue>> {
    let Some(index) = row.column_index(column.name()) else {
        return Ok(None);
    };
    if row.is_null(index) {
        return Ok(None);
    }

    let field_error = |source: CodecError| OrmError::Serialization {
        entity: T::type_name(),
        column: column.name().to_string(),
        source,
    };

    match column.declared() {
        DeclaredType::Primitive(kind) => {
            let value = read_cell(row, index, *kind).map_err(field_error)?;
            Ok(Some(FieldValue::Primitive(value)))
        }
        DeclaredType::Serialized {
            domain,
            domain_name,
        } => {
            let binding = session
                .registry()
                .lookup(*domain)
                .ok_or(CodecError::MissingSerializer {
                    domain: *domain_name,
                })
                .map_err(field_error)?;
            let stored = read_cell(row, index, binding.serialized_type()).map_err(field_error)?;
            let value = binding.deserialize(stored).map_err(|source| {
                field_error(CodecError::Serializer {
                    domain: *domain_name,
                    source,
                })
            })?;
            Ok(Some(FieldValue::Domain(value)))
        }
        DeclaredType::Reference(target) => {
            let key = row.get_long(index).map_err(field_error)?;
            match session.resolve_reference(target, key)? {
                Some(instance) => Ok(Some(FieldValue::Reference(instance))),
                None => {
                    warn!(
                        entity = T::type_name(),
                        column = column.name(),
                        target = target.type_name,
                        key,
                        "referenced row not found, leaving field untouched"
                    );
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Value;
    use crate::mapping::SchemaCatalog;
    use crate::test_fixtures::{fixture_registry, Sample};
    use rusqlite::types::Value as SqlValue;

    fn to_cell(value: &Value) -> SqlValue {
        match value {
            Value::Null => SqlValue::Null,
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Short(v) => SqlValue::Integer(i64::from(*v)),
            Value::Int(v) => SqlValue::Integer(i64::from(*v)),
            Value::Long(v) => SqlValue::Integer(*v),
            Value::Float(v) => SqlValue::Real(f64::from(*v)),
            Value::Double(v) => SqlValue::Real(*v),
            Value::Char(c) => SqlValue::Text(c.to_string()),
        }
    }

    fn round_trip(kind: PrimitiveKind, value: Value) {
        let registry = SerializerRegistry::new();
        let stored = encode(
            &DeclaredType::Primitive(kind),
            FieldRef::Primitive(value.clone()),
            &registry,
        )
        .unwrap();
        let row = Row::from_pairs([("c", to_cell(&stored))]);
        assert_eq!(read_cell(&row, 0, kind).unwrap(), value, "{:?}", kind);
    }

    #[test]
    fn test_primitive_round_trips() {
        for s in ["", "x", "multi\nline ünïcödé", "'; DROP TABLE t; --"] {
            round_trip(PrimitiveKind::Text, Value::Text(s.to_string()));
        }
        for b in [true, false] {
            round_trip(PrimitiveKind::Bool, Value::Bool(b));
        }
        for v in [0, -1, i16::MIN, i16::MAX] {
            round_trip(PrimitiveKind::Short, Value::Short(v));
        }
        for v in [0, -1, i32::MIN, i32::MAX] {
            round_trip(PrimitiveKind::Int, Value::Int(v));
        }
        for v in [0, -1, i64::MIN, i64::MAX] {
            round_trip(PrimitiveKind::Long, Value::Long(v));
        }
        for v in [0.0, -0.5, f32::MIN, f32::MAX, f32::MIN_POSITIVE, f32::INFINITY] {
            round_trip(PrimitiveKind::Float, Value::Float(v));
        }
        for v in [0.0, -1e300, f64::MAX, f64::MIN_POSITIVE, f64::NEG_INFINITY] {
            round_trip(PrimitiveKind::Double, Value::Double(v));
        }
        for c in ['a', 'é', '🦀'] {
            round_trip(PrimitiveKind::Char, Value::Char(c));
        }
    }

    #[test]
    fn test_nan_is_rejected() {
        assert_eq!(
            check_kind(PrimitiveKind::Double, Value::Double(f64::NAN)),
            Err(CodecError::NotANumber)
        );
        assert_eq!(
            check_kind(PrimitiveKind::Float, Value::Float(f32::NAN)),
            Err(CodecError::NotANumber)
        );
    }

    #[test]
    fn test_null_encodes_as_null() {
        let registry = SerializerRegistry::new();
        for declared in [
            DeclaredType::Primitive(PrimitiveKind::Long),
            DeclaredType::Primitive(PrimitiveKind::Text),
        ] {
            assert_eq!(
                encode(&declared, FieldRef::Null, &registry).unwrap(),
                Value::Null
            );
        }
    }

    #[test]
    fn test_kind_mismatch() {
        assert_eq!(
            check_kind(PrimitiveKind::Int, Value::Long(1)),
            Err(CodecError::TypeMismatch {
                expected: PrimitiveKind::Int,
                found: "long"
            })
        );
        assert!(check_kind(PrimitiveKind::Text, Value::Null).is_ok());
    }

    #[test]
    fn test_encode_sample_columns() {
        let registry = fixture_registry();
        let catalog = SchemaCatalog::new();
        let schema = catalog.resolve::<Sample>(&registry).unwrap();
        let sample = Sample::filled();

        let encoded: Vec<_> = schema
            .columns()
            .iter()
            .map(|c| encode_column(c, &sample, &registry).unwrap())
            .collect();
        assert!(encoded.contains(&Value::Short(-7)));
        assert!(encoded.contains(&Value::Char('B')));
        assert!(encoded.contains(&Value::Long(1_700_000_000_123)));

        let empty = Sample::default();
        let nulls = schema
            .columns()
            .iter()
            .filter(|c| encode_column(c, &empty, &registry).unwrap().is_null())
            .count();
        assert_eq!(nulls, schema.columns().len());
    }
}
