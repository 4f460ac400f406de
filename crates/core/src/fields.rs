//! Field type system.
//!
//! Every field value arrives as an untyped JSON payload. This module is the
//! single choke point that turns "any JSON value" into "a value guaranteed
//! consistent with the declared schema". Ambiguous inputs are rejected,
//! never coerced: boolean `true` is not a NUMBER, `3.5` is not an integer,
//! and a CHOICE value must be exactly one of its options.
//!
//! The type set is deliberately *closed* so that every validation arm is
//! checked exhaustively at compile time.

use crate::constants::RESERVED_PATIENT_FIELD_NAMES;
use crate::error::{RecordError, RecordResult};
use crate::templates::TemplateKind;
use expediente_store::predicate::parse_iso_date;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// The closed set of field types a template may declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    ShortText,
    Text,
    Number,
    Float,
    Date,
    Choice,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::ShortText => "SHORT_TEXT",
            FieldType::Text => "TEXT",
            FieldType::Number => "NUMBER",
            FieldType::Float => "FLOAT",
            FieldType::Date => "DATE",
            FieldType::Choice => "CHOICE",
        };
        write!(f, "{}", name)
    }
}

fn default_required() -> bool {
    true
}

/// One named, typed, optionally-constrained slot in a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Required and non-empty iff `field_type == Choice`; ignored otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Required for file templates; absent for patient templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

/// A raw field value as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmittedField {
    pub name: String,
    pub value: Value,
}

/// A validated field value inside a record's or file's field array.
///
/// `options` is carried denormalized on CHOICE values so that queries over
/// the field array never need to join back to the template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

fn invalid_type(definition: &FieldDefinition) -> RecordError {
    RecordError::InvalidFieldType {
        field: definition.name.clone(),
        expected: definition.field_type,
    }
}

/// Validates a raw JSON value against a field definition and returns its
/// canonical form.
///
/// Canonicalization per type: text and date values pass through as
/// strings, NUMBER becomes a JSON integer, FLOAT a JSON number, and CHOICE
/// the matched option string.
///
/// # Errors
///
/// Returns `InvalidFieldType` when the raw shape does not fit the declared
/// type, or `InvalidFieldValue` when the shape fits but the content is
/// rejected (a CHOICE value outside its options).
pub fn validate_value(definition: &FieldDefinition, raw: &Value) -> RecordResult<Value> {
    match definition.field_type {
        FieldType::ShortText | FieldType::Text => match raw {
            Value::String(s) => Ok(Value::String(s.clone())),
            _ => Err(invalid_type(definition)),
        },
        FieldType::Number => match raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Value::from(i));
                }
                // An integer-valued float is still an integer, if it fits.
                // The cast saturates out of range, and `i64::MAX as f64`
                // rounds up to 2^63, so the upper bound must be strict.
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                        return Ok(Value::from(f as i64));
                    }
                }
                Err(invalid_type(definition))
            }
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::from(i)),
                Err(_) => Err(invalid_type(definition)),
            },
            _ => Err(invalid_type(definition)),
        },
        FieldType::Float => match raw {
            Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| invalid_type(definition)),
                None => Err(invalid_type(definition)),
            },
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) => serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| invalid_type(definition)),
                Err(_) => Err(invalid_type(definition)),
            },
            _ => Err(invalid_type(definition)),
        },
        FieldType::Date => match raw {
            Value::String(s) if parse_iso_date(s).is_some() => Ok(Value::String(s.clone())),
            _ => Err(invalid_type(definition)),
        },
        FieldType::Choice => match raw {
            Value::String(s) => {
                if definition.options.iter().any(|option| option == s) {
                    Ok(Value::String(s.clone()))
                } else {
                    Err(RecordError::InvalidFieldValue {
                        field: definition.name.clone(),
                        reason: "value is not one of the field's options".into(),
                    })
                }
            }
            _ => Err(invalid_type(definition)),
        },
    }
}

/// Validates one field definition for the given template kind.
///
/// # Errors
///
/// - `MissingFields` when the name is empty
/// - `ReservedFieldName` for reserved names on patient templates
/// - `ChoiceMissingOptions` when a CHOICE field declares no options
/// - `MissingFieldDescription` when a file-template field lacks a description
pub fn validate_definition(definition: &FieldDefinition, kind: TemplateKind) -> RecordResult<()> {
    if definition.name.trim().is_empty() {
        return Err(RecordError::MissingFields);
    }

    if kind == TemplateKind::Patient
        && RESERVED_PATIENT_FIELD_NAMES.contains(&definition.name.as_str())
    {
        return Err(RecordError::ReservedFieldName {
            name: definition.name.clone(),
        });
    }

    if definition.field_type == FieldType::Choice && definition.options.is_empty() {
        return Err(RecordError::ChoiceMissingOptions {
            name: definition.name.clone(),
        });
    }

    if kind == TemplateKind::File
        && definition
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
    {
        return Err(RecordError::MissingFieldDescription {
            name: definition.name.clone(),
        });
    }

    Ok(())
}

/// Validates a whole definition list: per-field rules plus name uniqueness
/// (case-sensitive exact match).
pub fn validate_definitions(
    definitions: &[FieldDefinition],
    kind: TemplateKind,
) -> RecordResult<()> {
    let mut seen = HashSet::new();
    for definition in definitions {
        validate_definition(definition, kind)?;
        if !seen.insert(definition.name.as_str()) {
            return Err(RecordError::DuplicateFieldNames);
        }
    }
    Ok(())
}
