//! Per-agent output schema.
//!
//! [`ExtractionSchema::conform`] turns raw model JSON into an
//! [`ExtractionPayload`] with one entry per declared field, coercing values
//! to the declared [`FieldKind`] and reporting what did not fit.

use super::parsing::parse_number;
use super::payload::{ExtractionPayload, FieldValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    #[default]
    Text,
    Bool,
    List,
    Record,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldKind::Number => "number",
            FieldKind::Text => "text",
            FieldKind::Bool => "bool",
            FieldKind::List => "list",
            FieldKind::Record => "record",
        };
        f.write_str(s)
    }
}

/// Inclusive sanity range for numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One declared output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ValueRange>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            range: None,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn within(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ValueRange::new(min, max));
        self
    }

    /// Whether a conformed value satisfies this field structurally.
    pub fn accepts(&self, value: Option<&FieldValue>) -> bool {
        let value = value.unwrap_or(&FieldValue::Null);
        if !value.is_present() {
            return !self.required;
        }
        let kind_ok = matches!(
            (self.kind, value),
            (FieldKind::Number, FieldValue::Number(_))
                | (FieldKind::Text, FieldValue::Text(_))
                | (FieldKind::Bool, FieldValue::Bool(_))
                | (FieldKind::List, FieldValue::List(_))
                | (FieldKind::Record, FieldValue::Record(_))
        );
        let range_ok = match (self.range, value.as_number()) {
            (Some(range), Some(n)) => range.contains(n),
            _ => true,
        };
        kind_ok && range_ok
    }
}

/// What went wrong with one field during conformance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    NotAnObject,
    MissingRequired,
    TypeMismatch { expected: FieldKind, found: String },
    OutOfRange { value: f64, min: f64, max: f64 },
}

/// A field-level conformance problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub field: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::NotAnObject => write!(f, "output is not a JSON object"),
            ViolationKind::MissingRequired => write!(f, "missing required field {}", self.field),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.field, expected, found)
            }
            ViolationKind::OutOfRange { value, min, max } => write!(
                f,
                "{}: {} outside sanity range [{}, {}]",
                self.field, value, min, max
            ),
        }
    }
}

/// Result of conforming raw output to a schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conformed {
    pub payload: ExtractionPayload,
    pub violations: Vec<SchemaViolation>,
}

/// Declared output shape of an agent.
///
/// An empty schema is *open*: every key the model returns is kept as a
/// field with its natural JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractionSchema {
    pub fields: Vec<FieldSpec>,
}

impl ExtractionSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn is_open(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Conform raw model output to this schema.
    pub fn conform(&self, raw: &Value) -> Conformed {
        let mut conformed = Conformed::default();

        let Value::Object(map) = raw else {
            if !raw.is_null() {
                conformed.violations.push(SchemaViolation {
                    field: "<root>".to_string(),
                    kind: ViolationKind::NotAnObject,
                });
            }
            for spec in &self.fields {
                conformed
                    .payload
                    .fields
                    .insert(spec.name.clone(), FieldValue::Null);
            }
            return conformed;
        };

        if self.is_open() {
            for (key, value) in map {
                conformed
                    .payload
                    .fields
                    .insert(key.clone(), FieldValue::from(value));
            }
            return conformed;
        }

        for spec in &self.fields {
            let raw_value = map.get(&spec.name).unwrap_or(&Value::Null);
            match coerce(spec.kind, raw_value) {
                Some(value) => {
                    if let (Some(range), Some(n)) = (spec.range, value.as_number())
                        && !range.contains(n)
                    {
                        conformed.violations.push(SchemaViolation {
                            field: spec.name.clone(),
                            kind: ViolationKind::OutOfRange {
                                value: n,
                                min: range.min,
                                max: range.max,
                            },
                        });
                    }
                    if spec.required && !value.is_present() {
                        conformed.violations.push(SchemaViolation {
                            field: spec.name.clone(),
                            kind: ViolationKind::MissingRequired,
                        });
                    }
                    conformed.payload.fields.insert(spec.name.clone(), value);
                }
                None => {
                    conformed.violations.push(SchemaViolation {
                        field: spec.name.clone(),
                        kind: ViolationKind::TypeMismatch {
                            expected: spec.kind,
                            found: json_type_name(raw_value).to_string(),
                        },
                    });
                    conformed
                        .payload
                        .fields
                        .insert(spec.name.clone(), FieldValue::Null);
                    conformed
                        .payload
                        .extra
                        .insert(spec.name.clone(), raw_value.clone());
                }
            }
        }

        for (key, value) in map {
            if self.field(key).is_none() {
                conformed.payload.extra.insert(key.clone(), value.clone());
            }
        }

        conformed
    }
}

/// Coerce a raw JSON value to a declared kind. `None` means mismatch.
fn coerce(kind: FieldKind, raw: &Value) -> Option<FieldValue> {
    if raw.is_null() {
        return Some(FieldValue::Null);
    }
    match (kind, raw) {
        (FieldKind::Number, Value::Number(n)) => n.as_f64().map(FieldValue::Number),
        (FieldKind::Number, Value::String(s)) => {
            if s.trim().is_empty() {
                Some(FieldValue::Null)
            } else {
                parse_number(s).map(FieldValue::Number)
            }
        }
        (FieldKind::Text, Value::String(s)) => Some(FieldValue::Text(s.trim().to_string())),
        (FieldKind::Text, Value::Number(n)) => Some(FieldValue::Text(n.to_string())),
        (FieldKind::Bool, Value::Bool(b)) => Some(FieldValue::Bool(*b)),
        (FieldKind::Bool, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "ja" => Some(FieldValue::Bool(true)),
            "false" | "no" | "nej" => Some(FieldValue::Bool(false)),
            _ => None,
        },
        (FieldKind::List, Value::Array(_)) | (FieldKind::Record, Value::Object(_)) => {
            Some(FieldValue::from(raw))
        }
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}
