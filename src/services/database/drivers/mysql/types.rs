//! MySQL type conversion utilities.
//!
//! This module handles conversion between MySQL-specific types (from SQLx)
//! and the wire `Value` type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlColumn, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::services::database::traits::{Row, Value};

/// Converter between MySQL values and `Value`.
pub struct MySqlValueConverter;

impl MySqlValueConverter {
    /// Bind one positional value to a query.
    pub fn bind<'q>(
        query: Query<'q, MySql, MySqlArguments>,
        value: Value,
    ) -> Query<'q, MySql, MySqlArguments> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Integer(v) => query.bind(v),
            Value::Real(v) => query.bind(v),
            Value::Text(v) => query.bind(v),
        }
    }

    /// Convert a MySQL row to a column-name keyed `Row`.
    pub fn convert_row(mysql_row: &MySqlRow) -> Row {
        mysql_row
            .columns()
            .iter()
            .map(|col| (col.name().to_string(), Self::extract_value(mysql_row, col)))
            .collect()
    }

    fn extract_value(row: &MySqlRow, column: &MySqlColumn) -> Value {
        let index = column.ordinal();
        match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Err(_) => return Value::Null,
            _ => {}
        }

        Self::decode_by_type(row, index, column.type_info().name())
    }

    /// Decode a value based on its MySQL type name.
    fn decode_by_type(row: &MySqlRow, index: usize, type_name: &str) -> Value {
        match type_name {
            // MySQL reports TINYINT(1) as BOOLEAN
            "BOOLEAN" => row
                .try_get::<bool, _>(index)
                .map(Value::Bool)
                .unwrap_or(Value::Null),

            "TINYINT" => row
                .try_get::<i8, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "TINYINT UNSIGNED" => row
                .try_get::<u8, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "SMALLINT" => row
                .try_get::<i16, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "SMALLINT UNSIGNED" => row
                .try_get::<u16, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "MEDIUMINT" | "INT" => row
                .try_get::<i32, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => row
                .try_get::<u32, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "BIGINT" => row
                .try_get::<i64, _>(index)
                .map(Value::Integer)
                .unwrap_or(Value::Null),

            // Values past i64::MAX keep their digits as text
            "BIGINT UNSIGNED" => row
                .try_get::<u64, _>(index)
                .map(|v| match i64::try_from(v) {
                    Ok(signed) => Value::Integer(signed),
                    Err(_) => Value::Text(v.to_string()),
                })
                .unwrap_or(Value::Null),

            "FLOAT" => row
                .try_get::<f32, _>(index)
                .map(|v| Value::Real(v.into()))
                .unwrap_or(Value::Null),

            "DOUBLE" => row
                .try_get::<f64, _>(index)
                .map(Value::Real)
                .unwrap_or(Value::Null),

            "DECIMAL" => row
                .try_get::<Decimal, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .unwrap_or(Value::Null),

            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
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

            "DATETIME" => row
                .try_get::<NaiveDateTime, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            "TIMESTAMP" => row
                .try_get::<DateTime<Utc>, _>(index)
                .map(|v| Value::Text(v.to_rfc3339()))
                .or_else(|_| {
                    row.try_get::<NaiveDateTime, _>(index)
                        .map(|v| Value::Text(v.to_string()))
                })
                .unwrap_or(Value::Null),

            "YEAR" => row
                .try_get::<u16, _>(index)
                .map(|v| Value::Integer(v.into()))
                .unwrap_or(Value::Null),

            "JSON" => row
                .try_get::<serde_json::Value, _>(index)
                .map(|v| Value::Text(v.to_string()))
                .unwrap_or(Value::Null),

            // ENUM and SET arrive as strings
            _ if type_name.starts_with("ENUM") || type_name.starts_with("SET") => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .unwrap_or(Value::Null),

            _ => Self::decode_as_string_fallback(row, index),
        }
    }

    fn decode_as_string_fallback(row: &MySqlRow, index: usize) -> Value {
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
