//! Normalisation of decoded records into compact JSON.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::{
    decode::{EventTime, Record},
    value::RecordValue,
};

/// Errors that make a single record unencodable.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JSON has no representation for NaN or infinities.
    #[error("field {field:?} holds non-finite float {value}")]
    NonFiniteFloat { field: String, value: f64 },
    /// Only the timestamp extension has a JSON rendering.
    #[error("field {field:?} holds unsupported extension type {tag}")]
    UnsupportedExtension { field: String, tag: i8 },
    /// Arrays and maps cannot be object keys.
    #[error("unsupported {0} map key")]
    UnsupportedKey(&'static str),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Serialise `record`'s body as a compact JSON object.
///
/// Keys come out sorted, so identical records always produce identical
/// bytes. Byte sequences are rendered as UTF-8 text, with invalid sequences
/// replaced by U+FFFD.
pub fn encode(record: &Record) -> Result<Vec<u8>, EncodeError> {
    let object = normalise_entries(&record.body)?;
    Ok(serde_json::to_vec(&Value::Object(object))?)
}

fn normalise_entries(
    entries: &[(RecordValue, RecordValue)],
) -> Result<Map<String, Value>, EncodeError> {
    let mut object = Map::new();
    for (key, value) in entries {
        let key = key_text(key)?;
        let value = normalise(&key, value)?;
        object.insert(key, value);
    }
    Ok(object)
}

fn key_text(key: &RecordValue) -> Result<String, EncodeError> {
    match key {
        RecordValue::Str(s) => Ok(s.clone()),
        RecordValue::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        RecordValue::Nil => Ok("null".to_owned()),
        RecordValue::Bool(b) => Ok(b.to_string()),
        RecordValue::Int(n) => Ok(n.to_string()),
        RecordValue::UInt(n) => Ok(n.to_string()),
        RecordValue::Float(n) => Ok(n.to_string()),
        other => Err(EncodeError::UnsupportedKey(other.type_name())),
    }
}

/// Convert one value; `field` is the key it sits under, used in errors.
fn normalise(field: &str, value: &RecordValue) -> Result<Value, EncodeError> {
    Ok(match value {
        RecordValue::Nil => Value::Null,
        RecordValue::Bool(b) => Value::Bool(*b),
        RecordValue::Int(n) => Value::from(*n),
        RecordValue::UInt(n) => Value::from(*n),
        RecordValue::Float(f) => float(field, *f)?,
        RecordValue::Str(s) => Value::String(s.clone()),
        RecordValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        RecordValue::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| normalise(field, item))
                .collect::<Result<_, _>>()?,
        ),
        RecordValue::Map(entries) => Value::Object(normalise_entries(entries)?),
        RecordValue::Ext(tag, data) => {
            let time = (*tag == 0)
                .then(|| EventTime::from_ext(data))
                .flatten()
                .ok_or_else(|| EncodeError::UnsupportedExtension {
                    field: field.to_owned(),
                    tag: *tag,
                })?;
            float(field, time.as_f64())?
        }
    })
}

fn float(field: &str, value: f64) -> Result<Value, EncodeError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| EncodeError::NonFiniteFloat {
            field: field.to_owned(),
            value,
        })
}
