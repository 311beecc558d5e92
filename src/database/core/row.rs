//! Rows fetched from the driver
//!
//! A [`Row`] keeps the raw SQLite cells and offers one accessor per primitive
//! kind, mirroring a database cursor. Narrowing accessors range-check.

use crate::error::CodecError;
use crate::database::PrimitiveKind;
use rusqlite::types::Value as SqlValue;
use std::rc::Rc;

/// One fetched record: ordered column names and their cells
#[derive(Debug, Clone)]
pub struct Row {
    columns: Rc<[String]>,
    cells: Vec<SqlValue>,
}

impl Row {
    /// Build a row; `cells` must line up with `columns`
    pub fn new(columns: Rc<[String]>, cells: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), cells.len());
        Self { columns, cells }
    }

    /// Convenience constructor for hand-built rows
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, SqlValue)>,
        S: Into<String>,
    {
        let (columns, cells): (Vec<String>, Vec<SqlValue>) =
            pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self::new(columns.into(), cells)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Index of a column by name
    ///
    /// Exact matches win; otherwise names are compared ASCII case-insensitively,
    /// as SQLite does.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    pub fn cell(&self, index: usize) -> Option<&SqlValue> {
        self.cells.get(index)
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.cells.get(index), None | Some(SqlValue::Null))
    }

    pub fn get_string(&self, index: usize) -> Result<String, CodecError> {
        match self.cell_or_null(index) {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(mismatch(PrimitiveKind::Text, other)),
        }
    }

    pub fn get_bool(&self, index: usize) -> Result<bool, CodecError> {
        match self.cell_or_null(index) {
            SqlValue::Integer(v) => Ok(*v != 0),
            other => Err(mismatch(PrimitiveKind::Bool, other)),
        }
    }

    pub fn get_short(&self, index: usize) -> Result<i16, CodecError> {
        let v = self.integer(index, PrimitiveKind::Short)?;
        i16::try_from(v).map_err(|_| CodecError::OutOfRange {
            kind: PrimitiveKind::Short,
            value: v,
        })
    }

    pub fn get_int(&self, index: usize) -> Result<i32, CodecError> {
        let v = self.integer(index, PrimitiveKind::Int)?;
        i32::try_from(v).map_err(|_| CodecError::OutOfRange {
            kind: PrimitiveKind::Int,
            value: v,
        })
    }

    pub fn get_long(&self, index: usize) -> Result<i64, CodecError> {
        self.integer(index, PrimitiveKind::Long)
    }

    pub fn get_float(&self, index: usize) -> Result<f32, CodecError> {
        Ok(self.real(index, PrimitiveKind::Float)? as f32)
    }

    pub fn get_double(&self, index: usize) -> Result<f64, CodecError> {
        self.real(index, PrimitiveKind::Double)
    }

    pub fn get_char(&self, index: usize) -> Result<char, CodecError> {
        match self.cell_or_null(index) {
            SqlValue::Text(s) => s.chars().next().ok_or(CodecError::EmptyChar),
            other => Err(mismatch(PrimitiveKind::Char, other)),
        }
    }

    fn cell_or_null(&self, index: usize) -> &SqlValue {
        self.cells.get(index).unwrap_or(&SqlValue::Null)
    }

    fn integer(&self, index: usize, kind: PrimitiveKind) -> Result<i64, CodecError> {
        match self.cell_or_null(index) {
            SqlValue::Integer(v) => Ok(*v),
            other => Err(mismatch(kind, other)),
        }
    }

    fn real(&self, index: usize, kind: PrimitiveKind) -> Result<f64, CodecError> {
        match self.cell_or_null(index) {
            SqlValue::Real(v) => Ok(*v),
            // REAL affinity is not guaranteed for untyped columns
            SqlValue::Integer(v) => Ok(*v as f64),
            other => Err(mismatch(kind, other)),
        }
    }
}

fn mismatch(expected: PrimitiveKind, found: &SqlValue) -> CodecError {
    let found = match found {
        SqlValue::Null => "null",
        SqlValue::Integer(_) => "integer",
        SqlValue::Real(_) => "real",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
    };
    CodecError::TypeMismatch { expected, found }
}
