//! Structured extraction payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single extracted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Whether the value carries information (non-null, non-empty).
    ///
    /// Zero is a real value and counts as present.
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Text(s) => !s.trim().is_empty(),
            FieldValue::List(items) => !items.is_empty(),
            FieldValue::Record(map) => !map.is_empty(),
            FieldValue::Bool(_) | FieldValue::Number(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name used in violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
            FieldValue::Record(_) => "record",
        }
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or_default(),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => FieldValue::List(items.iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), FieldValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Conformed output of one agent invocation.
///
/// `fields` holds every field the agent's schema declares (absent ones as
/// [`FieldValue::Null`]). `extra` holds everything else the model returned,
/// including values that could not be coerced to their declared kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractionPayload {
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl ExtractionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion, mostly for tests and fixtures.
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn list(&self, name: &str) -> Option<&[FieldValue]> {
        self.get(name).and_then(FieldValue::as_list)
    }

    /// Names of fields holding a present value.
    pub fn present_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_present())
            .map(|(k, _)| k.as_str())
    }

    pub fn present_count(&self) -> usize {
        self.present_fields().count()
    }

    /// True when no declared field carries a value.
    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }
}
