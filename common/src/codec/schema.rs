//! Shape check for decoded payloads.
//!
//! A token only counts as a certificate if the text behind it is a JSON object with
//! every record field present and of the right primitive type. Nothing is defaulted:
//! a payload missing `batchNumber` is rejected rather than shown with an empty batch.

use crate::model::record::Record;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("payload is not valid JSON: {0}")]
    Syntax(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{field}` must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field `id` must not be empty")]
    EmptyId,
}

#[derive(Clone, Copy)]
enum Kind {
    String,
    Bool,
}

impl Kind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Bool => value.is_boolean(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Bool => "boolean",
        }
    }
}

const REQUIRED_FIELDS: &[(&str, Kind)] = &[
    ("id", Kind::String),
    ("studentName", Kind::String),
    ("email", Kind::String),
    ("mobileNumber", Kind::String),
    ("address", Kind::String),
    ("batchNumber", Kind::String),
    ("courseName", Kind::String),
    ("courseStartDate", Kind::String),
    ("courseEndDate", Kind::String),
    ("certificateIssueDate", Kind::String),
    ("isValid", Kind::Bool),
    ("createdAt", Kind::String),
];

/// Checks that `value` has the shape of a serialized [`Record`].
pub fn validate(value: &Value) -> Result<(), SchemaError> {
    let object = value.as_object().ok_or(SchemaError::NotAnObject)?;

    for &(field, kind) in REQUIRED_FIELDS {
        let field_value = object.get(field).ok_or(SchemaError::Missing(field))?;
        if !kind.matches(field_value) {
            return Err(SchemaError::WrongType {
                field,
                expected: kind.name(),
            });
        }
    }

    if let Some(url) = object.get("certificateUrl") {
        if !(url.is_string() || url.is_null()) {
            return Err(SchemaError::WrongType {
                field: "certificateUrl",
                expected: "string",
            });
        }
    }

    if object
        .get("id")
        .and_then(Value::as_str)
        .map(|id| id.trim().is_empty())
        .unwrap_or(true)
    {
        return Err(SchemaError::EmptyId);
    }

    Ok(())
}

/// Parses decoded payload text into a [`Record`] after validating its shape.
pub fn parse_record(text: &str) -> Result<Record, SchemaError> {
    let value: Value = serde_json::from_str(text).map_err(|e| SchemaError::Syntax(e.to_string()))?;
    validate(&value)?;
    serde_json::from_value(value).map_err(|e| SchemaError::Syntax(e.to_string()))
}
