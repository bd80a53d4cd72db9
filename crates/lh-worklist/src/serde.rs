use std::collections::BTreeMap;
use std::iter::FromIterator;

use lh_core::errors::{ErrorInfo, LhError};
use serde::Serialize;
use serde_json::{Map, Value};

fn serde_error(code: &str, err: impl ToString) -> LhError {
    LhError::Io(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, LhError> {
    let value =
        serde_json::to_value(value).map_err(|err| serde_error("lh_worklist.json_serialize", err))?;
    let canonical = canonicalize(value);
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical)
        .map_err(|err| serde_error("lh_worklist.json_write", err))?;
    Ok(bytes)
}

