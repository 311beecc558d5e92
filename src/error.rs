//! Error types
//!
//! Empty results are never errors: `load`, `first`, `last` and the query
//! operations return `None` or an empty `Vec` when nothing matches.

use crate::database::PrimitiveKind;
use std::fmt;
use std::str::FromStr;

pub type Result<T, E = OrmError> = std::result::Result<T, E>;

/// Errors surfaced by the mapping engine
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// Malformed table or column mapping, found when a type is first resolved
    #[error("schema error in {entity}: {reason}")]
    Schema { entity: &'static str, reason: String },

    /// A field could not be converted to or from its column
    #[error("failed to convert {entity}.{column}: {source}")]
    Serialization {
        entity: &'static str,
        column: String,
        #[source]
        source: CodecError,
    },

    /// The underlying storage call failed
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The operation does not fit the record's lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Foreign-key hydration went deeper than the configured bound
    #[error("reference chain deeper than {limit} while loading {entity} #{key}")]
    ReferenceDepthExceeded {
        entity: &'static str,
        key: i64,
        limit: usize,
    },
}

impl OrmError {
    pub(crate) fn schema(entity: &'static str, reason: impl Into<String>) -> Self {
        OrmError::Schema {
            entity,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        OrmError::InvalidState(message.into())
    }

    /// Whether this error came from the driver
    pub fn is_driver(&self) -> bool {
        matches!(self, OrmError::Driver(_))
    }

    /// Whether this error came from converting a row, as opposed to storage
    /// or lifecycle state
    pub fn is_conversion(&self) -> bool {
        matches!(
            self,
            OrmError::Serialization { .. } | OrmError::ReferenceDepthExceeded { .. }
        )
    }
}

/// Value-level conversion failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("expected a {expected} value, found {found}")]
    TypeMismatch {
        expected: PrimitiveKind,
        found: &'static str,
    },

    #[error("value {value} does not fit in a {kind}")]
    OutOfRange { kind: PrimitiveKind, value: i64 },

    #[error("empty text cannot be read as a char")]
    EmptyChar,

    #[error("NaN cannot be stored")]
    NotANumber,

    #[error("referenced {target} has not been saved")]
    UnsavedReference { target: &'static str },

    #[error("no serializer registered for {domain}")]
    MissingSerializer { domain: &'static str },

    #[error("serializer for {domain} failed: {source}")]
    Serializer {
        domain: &'static str,
        #[source]
        source: SerializationError,
    },
}

/// Failure reported by a [`TypeSerializer`](crate::mapping::TypeSerializer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationError {
    message: String,
}

impl SerializationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SerializationError {}

/// Errors from the storage driver
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to open database at '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// How per-field and per-row failures are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// The first field failure fails the whole save/hydrate call
    #[default]
    Strict,
    /// Log and skip failing fields; a failing row empties the whole result
    Lenient,
}

impl ErrorPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorPolicy::Strict => "strict",
            ErrorPolicy::Lenient => "lenient",
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ErrorPolicy::Strict),
            "lenient" | "legacy" => Ok(ErrorPolicy::Lenient),
            other => Err(anyhow::anyhow!("Unknown error policy: {}", other)),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_policy_from_str() {
        assert_eq!("strict".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Strict);
        assert_eq!("LENIENT".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Lenient);
        assert_eq!("legacy".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Lenient);
        assert!("loose".parse::<ErrorPolicy>().is_err());
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Strict);
    }

    #[test]
    fn test_error_display() {
        let err = OrmError::Serialization {
            entity: "Note",
            column: "title".to_string(),
            source: CodecError::TypeMismatch {
                expected: PrimitiveKind::Text,
                found: "long",
            },
        };
        assert_eq!(
            err.to_string(),
            "failed to convert Note.title: expected a text value, found long"
        );

        let err = OrmError::schema("Note", "duplicate column 'title'");
        assert_eq!(
            err.to_string(),
            "schema error in Note: duplicate column 'title'"
        );
        assert!(!err.is_driver());
        assert!(!err.is_conversion());
        assert!(!OrmError::invalid_state("borrowed").is_conversion());
    }
}
