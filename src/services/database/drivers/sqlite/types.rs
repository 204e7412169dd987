//! SQLite type conversion utilities.
//!
//! This module handles conversion between SQLite values (from SQLx)
//! and the wire `Value` type.
//!
//! SQLite uses dynamic typing, so decoding goes by the storage class of
//! each value rather than by the declared column type:
//! - INTEGER: 64-bit signed integer
//! - REAL: 64-bit floating point
//! - TEXT: UTF-8 string
//! - BLOB: Binary data, rendered as hex text
//! - NULL: Null value
//!
//! The one exception is a column declared `BOOLEAN`/`BOOL`: integers and the
//! words `true`/`false` in it decode as `Value::Bool`, other values as usual.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::services::database::traits::{Row, Value};

/// Converter between SQLite values and `Value`.
pub struct SqliteValueConverter;

impl SqliteValueConverter {
    /// Bind one positional value to a query.
    pub fn bind<'q>(
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
        value: Value,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Integer(v) => query.bind(v),
            Value::Real(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        }
    }

    /// Convert a SQLite row to a column-name keyed `Row`.
    pub fn convert_row(sqlite_row: &SqliteRow) -> Row {
        sqlite_row
            .columns()
            .iter()
            .map(|col| {
                let declared = col.type_info().name().to_uppercase();
                let value = Self::extract_value(sqlite_row, col.ordinal(), &declared);
                (col.name().to_string(), value)
            })
            .collect()
    }

    /// Extract a value from a SQLite row at the given column index.
    fn extract_value(row: &SqliteRow, index: usize, declared: &str) -> Value {
        let storage = match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => raw.type_info().name().to_uppercase(),
            Err(_) => return Value::Null,
        };

        if matches!(declared, "BOOLEAN" | "BOOL") {
            if let Some(v) = Self::decode_bool(row, index, &storage) {
                return Value::Bool(v);
            }
        }

        Self::decode_by_storage(row, index, &storage)
    }

    /// Integers and the words `true`/`false` read as booleans. Anything else
    /// stored in a BOOLEAN column keeps its own storage class.
    fn decode_bool(row: &SqliteRow, index: usize, storage: &str) -> Option<bool> {
        match storage {
            "INTEGER" => row.try_get::<i64, _>(index).ok().map(|v| v != 0),
            "TEXT" => {
                let text = row.try_get::<String, _>(index).ok()?;
                if text.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn decode_by_storage(row: &SqliteRow, index: usize, storage: &str) -> Value {
        match storage {
            "INTEGER" => row
                .try_get::<i64, _>(index)
                .map(Value::Integer)
                .unwrap_or(Value::Null),

            "REAL" => row
                .try_get::<f64, _>(index)
                .map(Value::Real)
                .unwrap_or(Value::Null),

            "TEXT" => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .unwrap_or(Value::Null),

            "BLOB" => row
                .try_get::<Vec<u8>, _>(index)
                .map(|bytes| Value::Text(hex::encode(bytes)))
                .unwrap_or(Value::Null),

            _ => Self::decode_unknown(row, index),
        }
    }

    /// Storage classes other than the four above do not occur for non-null
    /// values, but try the common decode paths anyway.
    fn decode_unknown(row: &SqliteRow, index: usize) -> Value {
        if let Ok(v) = row.try_get::<i64, _>(index) {
            return Value::Integer(v);
        }
        if let Ok(v) = row.try_get::<f64, _>(index) {
            return Value::Real(v);
        }
        row.try_get::<String, _>(index)
            .map(Value::Text)
            .unwrap_or(Value::Null)
    }
}
