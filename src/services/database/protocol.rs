//! Wire contract between the handle and the remote side.
//!
//! | Command | Request                         | Reply (version 1)                 |
//! |---------|---------------------------------|-----------------------------------|
//! | load    | `{ db }`                        | canonical path string, or `null`  |
//! | execute | `{ db, query, values }`         | `[rowsAffected, lastInsertId]`    |
//! | select  | `{ db, query, values }`         | `[{ column: value, .. }, ..]`     |
//! | close   | `{ db }` or `{}`                | `bool`                            |
//!
//! Only the positional `execute` pair is accepted; a reply with named fields
//! is a protocol error rather than something to guess around.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::TransportError;
use super::traits::{QueryResult, Row, Value};

/// Version of the request/reply shapes in this module.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub db: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub db: String,
    pub query: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CloseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
}

/// Version-1 `execute` reply: `(rowsAffected, lastInsertId)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteReply(pub u64, pub u64);

impl From<ExecuteReply> for QueryResult {
    fn from(reply: ExecuteReply) -> Self {
        QueryResult::new(reply.0, reply.1)
    }
}

impl From<QueryResult> for ExecuteReply {
    fn from(result: QueryResult) -> Self {
        ExecuteReply(result.rows_affected, result.last_insert_id)
    }
}

pub(crate) fn encode<T: Serialize>(request: &T) -> Result<JsonValue, TransportError> {
    Ok(serde_json::to_value(request)?)
}

pub(crate) fn decode_request<T: for<'de> Deserialize<'de>>(
    payload: JsonValue,
) -> Result<T, TransportError> {
    Ok(serde_json::from_value(payload)?)
}

/// Decode a `load` reply; `None` means the remote side did not echo a path.
pub fn decode_load_reply(reply: JsonValue) -> Result<Option<String>, TransportError> {
    match reply {
        JsonValue::Null => Ok(None),
        JsonValue::String(path) => Ok(Some(path)),
        other => Err(TransportError::Protocol(format!(
            "`load` expected a path string, got {}",
            other
        ))),
    }
}

pub fn decode_execute_reply(reply: JsonValue) -> Result<QueryResult, TransportError> {
    if !reply.is_array() {
        return Err(TransportError::Protocol(format!(
            "`execute` expected a [rowsAffected, lastInsertId] pair, got {}",
            reply
        )));
    }
    let pair: ExecuteReply = serde_json::from_value(reply).map_err(|e| {
        TransportError::Protocol(format!("`execute` reply is not a pair of counts: {}", e))
    })?;
    Ok(pair.into())
}

pub fn decode_rows(reply: JsonValue) -> Result<Vec<JsonValue>, TransportError> {
    match reply {
        JsonValue::Array(rows) => Ok(rows),
        other => Err(TransportError::Protocol(format!(
            "`select` expected an array of rows, got {}",
            other
        ))),
    }
}

pub fn decode_select_reply(reply: JsonValue) -> Result<Vec<Row>, TransportError> {
    decode_rows(reply)?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| TransportError::Protocol(format!("`select` row is not a map: {}", e)))
        })
        .collect()
}

pub fn decode_close_reply(reply: JsonValue) -> Result<bool, TransportError> {
    reply.as_bool().ok_or_else(|| {
        TransportError::Protocol(format!("`close` expected a boolean, got {}", reply))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_close_request_omits_missing_name() {
        assert_eq!(encode(&CloseRequest::default()).unwrap(), json!({}));
        assert_eq!(
            encode(&CloseRequest { db: Some("sqlite:a.db".into()) }).unwrap(),
            json!({ "db": "sqlite:a.db" })
        );
    }

    #[test]
    fn test_query_request_shape() {
        let request = QueryRequest {
            db: "sqlite:a.db".into(),
            query: "INSERT INTO t(v) VALUES ($1)".into(),
            values: vec![Value::from("x"), Value::Null],
        };
        assert_eq!(
            encode(&request).unwrap(),
            json!({ "db": "sqlite:a.db", "query": "INSERT INTO t(v) VALUES ($1)", "values": ["x", null] })
        );
    }

    #[test]
    fn test_execute_reply_is_positional() {
        let result = decode_execute_reply(json!([3, 9])).unwrap();
        assert_eq!(result, QueryResult::new(3, 9));
    }

    #[test]
    fn test_execute_reply_rejects_named_fields() {
        let err = decode_execute_reply(json!({ "rowsAffected": 1, "lastInsertId": 2 })).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));

        let err = decode_execute_reply(json!([1])).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));

        let err = decode_execute_reply(json!([-1, 0])).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn test_load_reply_variants() {
        assert_eq!(decode_load_reply(json!("sqlite:a.db")).unwrap().as_deref(), Some("sqlite:a.db"));
        assert_eq!(decode_load_reply(json!(null)).unwrap(), None);
        assert!(decode_load_reply(json!(true)).is_err());
    }

    #[test]
    fn test_select_reply_preserves_order() {
        let rows = decode_select_reply(json!([{ "id": 2 }, { "id": 1 }])).unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(2)));
        assert_eq!(rows[1].get("id"), Some(&Value::Integer(1)));

        assert!(decode_select_reply(json!({ "id": 1 })).is_err());
        assert!(decode_select_reply(json!([[1, 2]])).is_err());
    }

    #[test]
    fn test_close_reply() {
        assert!(decode_close_reply(json!(true)).unwrap());
        assert!(!decode_close_reply(json!(false)).unwrap());
        assert!(decode_close_reply(json!("yes")).is_err());
    }
}
