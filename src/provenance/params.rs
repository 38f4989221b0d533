//! Turning Galaxy's raw job parameter maps into [`ParamValue`]s.
//!
//! Galaxy reports parameters as a loosely typed JSON tree: values are often
//! JSON-encoded strings, conditionals and sections are nested objects, repeats
//! are arrays of objects, and data inputs are `{"values": [{"id", "src"}]}`.
//! Everything is flattened to dotted names with leaf values.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use super::types::{DatasetRef, OutputSlot, ParamValue};

/// Parameter names Galaxy adds for its own bookkeeping.
const INTERNAL_KEYS: &[&str] = &["chromInfo", "dbkey"];

/// Flattened parameters plus the names that could not be resolved.
#[derive(Debug, Default)]
pub struct ResolvedParameters {
    pub values: BTreeMap<String, ParamValue>,
    pub unresolved: Vec<String>,
}

/// Resolve a raw parameter map.
///
/// `producers` maps dataset ids to the job output that created them; dataset
/// references are linked one level only.
pub fn resolve_parameters(
    params: &Map<String, Value>,
    producers: &HashMap<String, OutputSlot>,
) -> ResolvedParameters {
    let mut resolved = ResolvedParameters::default();
    for (name, value) in params {
        if is_internal_key(name) {
            continue;
        }
        flatten_into(name.clone(), value, producers, &mut resolved);
    }
    resolved
}

/// Galaxy prefixes its bookkeeping parameters (`__job_resource`, `__current_case__`) with `__`.
fn is_internal_key(name: &str) -> bool {
    name.starts_with("__") || INTERNAL_KEYS.contains(&name)
}

fn flatten_into(
    name: String,
    value: &Value,
    producers: &HashMap<String, OutputSlot>,
    resolved: &mut ResolvedParameters,
) {
    let value = decode_json_text(value);

    if let Some(leaf) = leaf_value(&value, producers) {
        if leaf.contains_unresolved() {
            resolved.unresolved.push(name.clone());
        }
        resolved.values.insert(name, leaf);
        return;
    }

    match value.as_ref() {
        Value::Object(fields) => {
            let mut visible = fields.iter().filter(|(key, _)| !is_internal_key(key)).peekable();
            // Keep the name listed even when nothing inside it is reportable.
            if visible.peek().is_none() {
                resolved.values.insert(name, ParamValue::Null);
                return;
            }
            for (key, nested) in visible {
                flatten_into(format!("{}.{}", name, key), nested, producers, resolved);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(format!("{}.{}", name, index), item, producers, resolved);
            }
        }
        // Scalars are always leaves.
        _ => {}
    }
}

/// Decode one level of JSON encoding from string values.
///
/// Numbers stay as their text so [`text_value`] sees exactly what Galaxy sent.
fn decode_json_text(value: &Value) -> Cow<'_, Value> {
    match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Number(_)) => Cow::Borrowed(value),
            Ok(decoded) => Cow::Owned(decoded),
            Err(_) => Cow::Borrowed(value),
        },
        _ => Cow::Borrowed(value),
    }
}

/// The leaf value for `value`, or `None` when it is a nested structure.
fn leaf_value(value: &Value, producers: &HashMap<String, OutputSlot>) -> Option<ParamValue> {
    match value {
        Value::Null => Some(ParamValue::Null),
        Value::Bool(flag) => Some(ParamValue::Bool(*flag)),
        Value::Number(number) => Some(number_value(number)),
        Value::String(text) => Some(text_value(text)),
        Value::Object(fields) => {
            if is_runtime_placeholder(fields) {
                Some(ParamValue::Unresolved)
            } else {
                dataset_value(fields, producers)
            }
        }
        Value::Array(items) => items
            .iter()
            .map(|item| leaf_value(&decode_json_text(item), producers))
            .collect::<Option<Vec<_>>>()
            .map(ParamValue::List),
    }
}

fn number_value(number: &serde_json::Number) -> ParamValue {
    match (number.as_i64(), number.as_f64()) {
        (Some(integer), _) => ParamValue::Integer(integer),
        (None, Some(float)) => float_value(float, &number.to_string()),
        _ => ParamValue::Text(number.to_string()),
    }
}

/// A float only when printing it gives back `text`; otherwise the text as written.
fn float_value(float: f64, text: &str) -> ParamValue {
    if float.is_finite() && float.to_string() == text {
        ParamValue::Float(float)
    } else {
        ParamValue::Text(text.to_string())
    }
}

/// Galaxy often reports numbers and booleans as text; restore their type.
fn text_value(text: &str) -> ParamValue {
    match text {
        "true" | "True" => return ParamValue::Bool(true),
        "false" | "False" => return ParamValue::Bool(false),
        _ => {}
    }

    if let Ok(integer) = text.parse::<i64>() {
        // Keep zero-padded identifiers such as "007" as text.
        if integer.to_string() == text {
            return ParamValue::Integer(integer);
        }
    }

    let numeric_chars = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E' | '+'));
    if numeric_chars && text.contains('.') {
        if let Ok(float) = text.parse::<f64>() {
            return float_value(float, text);
        }
    }

    ParamValue::Text(text.to_string())
}

fn is_runtime_placeholder(fields: &Map<String, Value>) -> bool {
    matches!(
        fields.get("__class__").and_then(Value::as_str),
        Some("RuntimeValue") | Some("ConnectedValue")
    )
}

/// Dataset references: `{"src", "id"}` or `{"values": [{"src", "id"}, ...]}`.
fn dataset_value(
    fields: &Map<String, Value>,
    producers: &HashMap<String, OutputSlot>,
) -> Option<ParamValue> {
    if let Some(values) = fields.get("values").and_then(Value::as_array) {
        let mut refs = values
            .iter()
            .map(|item| item.as_object().and_then(|obj| dataset_ref(obj, producers)))
            .collect::<Option<Vec<_>>>()?;
        return Some(match refs.len() {
            0 => ParamValue::Null,
            1 => ParamValue::Dataset(refs.remove(0)),
            _ => ParamValue::List(refs.into_iter().map(ParamValue::Dataset).collect()),
        });
    }

    dataset_ref(fields, producers).map(ParamValue::Dataset)
}

fn dataset_ref(
    fields: &Map<String, Value>,
    producers: &HashMap<String, OutputSlot>,
) -> Option<DatasetRef> {
    let src = fields.get("src").and_then(Value::as_str)?;
    let dataset_id = match fields.get("id")? {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };

    Some(DatasetRef {
        producer: producers.get(&dataset_id).cloned(),
        dataset_id,
        src: Some(src.to_string()),
    })
}
