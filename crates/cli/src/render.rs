#![forbid(unsafe_code)]

use crate::clock::ts_ms_to_rfc3339;
use serde::Serialize;
use serde_json::{Map, Value, json};

const MS_KEY: &str = "created_at_ms";
const RFC3339_KEY: &str = "created_at";

/// Response fields whose elements are records with their own timestamp.
const RECORD_LISTS: [&str; 2] = ["data", "versions"];

/// Serializes a response and swaps each record's `created_at_ms` for an
/// RFC 3339 `created_at`.
///
/// Only the response records themselves are touched: a summary or view at the
/// top (or each element of a top-level list) plus the entries of its `data` and
/// `versions` lists. Message `content` and `metadata` are emitted verbatim.
pub(crate) fn render<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(value)?;
    match &mut value {
        Value::Array(items) => items.iter_mut().for_each(stamp_response),
        response => stamp_response(response),
    }
    Ok(value)
}

pub(crate) fn error_body(code: &str, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message } })
}

fn stamp_response(value: &mut Value) {
    let Value::Object(fields) = value else {
        return;
    };
    stamp_record(fields);
    for list in RECORD_LISTS {
        if let Some(Value::Array(records)) = fields.get_mut(list) {
            for record in records {
                if let Value::Object(record) = record {
                    stamp_record(record);
                }
            }
        }
    }
}

fn stamp_record(fields: &mut Map<String, Value>) {
    let Some(ts_ms) = fields.get(MS_KEY).and_then(Value::as_i64) else {
        return;
    };
    fields.remove(MS_KEY);
    fields.insert(
        RFC3339_KEY.to_string(),
        Value::String(ts_ms_to_rfc3339(ts_ms)),
    );
}
