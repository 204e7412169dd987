//! PostgreSQL type conversion utilities.
//!
//! This module handles conversion between PostgreSQL-specific types (from SQLx)
//! and the wire `Value` type. Types without a scalar counterpart are rendered
//! as text: numerics, dates and times, UUIDs, JSON, and arrays (as JSON text).
//! `BYTEA` becomes hex text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgColumn, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::services::database::traits::{Row, Value};

/// Converter between PostgreSQL values and `Value`.
pub struct PgValueConverter;

impl PgValueConverter {
    /// Bind one positional value to a query.
    ///
    /// NULL is sent as a text-typed parameter.
    pub fn bind<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: Value,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Integer(v) => query.bind(v),
            Value::Real(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        }
    }

    /// Convert a PostgreSQL row to a column-name keyed `Row`.
    pub fn convert_row(pg_row: &PgRow) -> Row {
        pg_row
            .columns()
            .iter()
            .map(|col| (col.name().to_string(), Self::extract_value(pg_row, col)))
            .collect()
    }

    /// Extract a value from a PostgreSQL row for the given column.
    fn extract_value(row: &PgRow, column: &PgColumn) -> Value {
        let index = column.ordinal();
        match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Err(_) => return Value::Null,
            _ => {}
        }

        Self::decode_by_type(row, index, column.type_info().name())
    }

    /// Decode a value based on its PostgreSQL type name.
    fn decode_by_type(row: &PgRow, index: usize, type_name: &str) -> Value {
        match type_name {
            "BOOL" => row
                .try_get::<bool, _>(index)
                .map(Value::Bool)
                .unwrap_or(Value::Null),

            "INT2" => row
                .try_get::<i16, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "INT4" => row
                .try_get::<i32, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "INT8" => row
                .try_get::<i64, _>(index)
                .map(Value::Integer)
                .unwrap_or(Value::Null),

            "FLOAT4" => row
                .try_get::<f32, _>(index)
                .map(|v| Value::Real(v.into()))
                .unwrap_or(Value::Null),

            "FLOAT8" => row
                .try_get::<f64, _>(index)
                .map(Value::Real)
                .unwrap_or(Value::Null),

            "NUMERIC" => row
                .try_get::<Decimal, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .unwrap_or(Value::Null),

            "BYTEA" => row
                .try_get::<Vec<u8>, _>(index)
                .map(|bytes| Value::Text(hex::encode(bytes)))
                .unwrap_or(Value::Null),

            "DATE" => row
                .try_get::<NaiveDate, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "TIME" => row
                .try_get::<NaiveTime, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "TIMESTAMP" => row
                .try_get::<NaiveDateTime, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "TIMESTAMPTZ" => row
                .try_get::<DateTime<Utc>, _>(index)
                .map(|v| Value::Text(v.to_rfc3339()))
                .unwrap_or(Value::Null),

            "UUID" => row
                .try_get::<Uuid, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "JSON" | "JSONB" => row
                .try_get::<serde_json::Value, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "INT4[]" => Self::decode_array::<i32>(row, index),
            "INT8[]" => Self::decode_array::<i64>(row, index),
            "TEXT[]" | "VARCHAR[]" => Self::decode_array::<String>(row, index),
            "BOOL[]" => Self::decode_array::<bool>(row, index),
            "FLOAT8[]" => Self::decode_array::<f64>(row, index),

            _ => Self::decode_as_string_fallback(row, index),
        }
    }

    /// Decode an array column as JSON text.
    fn decode_array<T>(row: &PgRow, index: usize) -> Value
    where
        T: serde::Serialize,
        Vec<T>: sqlx::Type<Postgres> + for<'r> sqlx::Decode<'r, Postgres>,
    {
        row.try_get::<Vec<T>, _>(index)
            .ok()
            .and_then(|items| serde_json::to_string(&items).ok())
            .map(Value::Text)
            .unwrap_or(Value::Null)
    }

    /// Fallback for unknown types: text if PostgreSQL can give it, else a number.
    fn decode_as_string_fallback(row: &PgRow, index: usize) -> Value {
        if let Ok(s) = row.try_get::<String, _>(index) {
            return Value::Text(s);
        }
        if let Ok(v) = row.try_get::<i64, _>(index) {
            return Value::Integer(v);
        }
        row.try_get::<f64, _>(index)
            .map(Value::Real)
            .unwrap_or(Value::Null)
    }
}
