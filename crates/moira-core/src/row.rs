//! Typed decoding of query rows.
//!
//! Each record kind declares its field order once as a [`RowSchema`]; rows are
//! decoded positionally against it. Nothing is populated by name at runtime.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Timestamp format used by the server.
pub const DATETIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// Type of a single positional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form string
    Str,
    /// `1` / `0`
    Bool,
    /// Decimal integer; unparseable values decode as absent
    Int,
    /// Timestamp in [`DATETIME_FORMAT`]
    DateTime,
}

/// Decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// String value
    Str(String),
    /// Boolean value
    Bool(bool),
    /// Integer value, absent when the server sent a non-number
    Int(Option<i64>),
    /// Timestamp value
    DateTime(NaiveDateTime),
}

/// Ordered field table for one record kind.
#[derive(Debug, Clone, Copy)]
pub struct RowSchema {
    fields: &'static [(&'static str, FieldKind)],
}

impl RowSchema {
    /// Creates a schema from a static field table.
    #[must_use]
    pub const fn new(fields: &'static [(&'static str, FieldKind)]) -> Self {
        Self { fields }
    }

    /// Number of fields a row must have.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Field names in wire order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    /// Decodes a row into a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] if the arity does not match or a value cannot be
    /// converted to its declared kind.
    pub fn decode<S: AsRef<str>>(&self, row: &[S]) -> Result<DecodedRow> {
        if row.len() != self.fields.len() {
            return Err(Error::User(format!(
                "server returned a row with {} fields, expected {}",
                row.len(),
                self.fields.len()
            )));
        }

        let values = self
            .fields
            .iter()
            .zip(row)
            .map(|((name, kind), raw)| Ok((*name, decode_value(*kind, raw.as_ref())?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(DecodedRow { values })
    }
}

/// A row decoded against a [`RowSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedRow {
    values: BTreeMap<&'static str, FieldValue>,
}

impl DecodedRow {
    /// Returns the raw decoded value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Returns a string field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] if the field is missing or not a string.
    pub fn str(&self, field: &str) -> Result<&str> {
        match self.get(field) {
            Some(FieldValue::Str(value)) => Ok(value),
            _ => Err(field_type_error(field, "string")),
        }
    }

    /// Returns a boolean field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] if the field is missing or not a boolean.
    pub fn bool(&self, field: &str) -> Result<bool> {
        match self.get(field) {
            Some(FieldValue::Bool(value)) => Ok(*value),
            _ => Err(field_type_error(field, "boolean")),
        }
    }

    /// Returns an integer field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] if the field is missing or not an integer.
    pub fn int(&self, field: &str) -> Result<Option<i64>> {
        match self.get(field) {
            Some(FieldValue::Int(value)) => Ok(*value),
            _ => Err(field_type_error(field, "integer")),
        }
    }

    /// Returns a timestamp field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::User`] if the field is missing or not a timestamp.
    pub fn datetime(&self, field: &str) -> Result<NaiveDateTime> {
        match self.get(field) {
            Some(FieldValue::DateTime(value)) => Ok(*value),
            _ => Err(field_type_error(field, "timestamp")),
        }
    }
}

/// Converts a single wire value to its declared kind.
///
/// # Errors
///
/// Returns [`Error::User`] for invalid booleans and timestamps.
pub fn decode_value(kind: FieldKind, raw: &str) -> Result<FieldValue> {
    match kind {
        FieldKind::Str => Ok(FieldValue::Str(raw.to_string())),
        FieldKind::Bool => match raw {
            "1" => Ok(FieldValue::Bool(true)),
            "0" => Ok(FieldValue::Bool(false)),
            _ => Err(Error::User(format!(
                "invalid boolean value `{raw}` received from server"
            ))),
        },
        FieldKind::Int => Ok(FieldValue::Int(raw.trim().parse().ok())),
        FieldKind::DateTime => NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
            .map(FieldValue::DateTime)
            .map_err(|err| Error::User(format!("invalid timestamp `{raw}`: {err}"))),
    }
}

fn field_type_error(field: &str, expected: &str) -> Error {
    Error::User(format!("field `{field}` is not a {expected}"))
}
