//! Object mapper between data objects and JSON objects.
//!
//! # Design
//! Data objects are plain structs deriving `Serialize`/`Deserialize` whose
//! field names are the JSON keys verbatim and whose fields are all `Option`s.
//! The supported kinds are `String`, `i64`, `serde_json::Number` (decimal,
//! kept at full precision), `bool`, `Vec<String>` and nested data objects.
//!
//! Unknown keys are ignored and missing keys leave fields at `None`, both of
//! which serde derive already does. A field whose JSON value has the wrong
//! kind is also left at `None` when it is tagged with [`lenient`]:
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! pub struct Widget {
//!     #[serde(default, deserialize_with = "restlink_core::lenient")]
//!     pub id: Option<String>,
//!     #[serde(default, deserialize_with = "restlink_core::lenient")]
//!     pub count: Option<i64>,
//! }
//!
//! let widget: Widget = restlink_core::mapper::decode_str(r#"{"id":"w1","count":"many"}"#).unwrap();
//! assert_eq!(widget.id.as_deref(), Some("w1"));
//! assert_eq!(widget.count, None);
//! ```

use std::io::{BufRead, Cursor};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::json::{Event, JsonReader};

/// Encodes `object` as a JSON object, omitting unset fields.
pub fn encode<T: Serialize>(object: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(object).map_err(|e| Error::Encode(e.to_string()))? {
        Value::Object(mut members) => {
            strip_nulls(&mut members);
            Ok(members)
        }
        other => Err(Error::Encode(format!(
            "expected an object, found {}",
            kind_of(&other)
        ))),
    }
}

/// Encodes `object` to a JSON string, omitting unset fields.
pub fn encode_to_string<T: Serialize>(object: &T) -> Result<String> {
    let members = encode(object)?;
    serde_json::to_string(&members).map_err(|e| Error::Encode(e.to_string()))
}

/// Decodes the next JSON object from `reader` into a `T`.
pub fn decode<T, R>(reader: &mut JsonReader<R>) -> Result<T>
where
    T: DeserializeOwned,
    R: BufRead,
{
    match reader.expect_event()? {
        Event::StartObject => decode_object(reader),
        other => Err(Error::protocol(format!("bad json event: {other}"))),
    }
}

/// Decodes an object whose `StartObject` event was already consumed.
pub fn decode_object<T, R>(reader: &mut JsonReader<R>) -> Result<T>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let members = reader.read_object_body()?;
    Ok(T::deserialize(Value::Object(members))?)
}

pub fn decode_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    decode(&mut JsonReader::new(Cursor::new(input.as_bytes())))
}

/// Field adapter that turns a kind mismatch into an unset field.
///
/// Use with `#[serde(default, deserialize_with = "restlink_core::lenient")]`
/// on an `Option<_>` field. Malformed JSON still fails the whole decode; only
/// well-formed values of the wrong kind are dropped.
pub fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(T::deserialize(value).ok())
}

fn strip_nulls(members: &mut Map<String, Value>) {
    members.retain(|_, value| !value.is_null());
    for value in members.values_mut() {
        if let Value::Object(nested) = value {
            strip_nulls(nested);
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
