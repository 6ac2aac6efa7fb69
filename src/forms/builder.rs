use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use super::type_family::{TypeFamily, classify};
use crate::db::schema::ColumnDescriptor;
use crate::db::table::cell_text;
use crate::db::{RecordPayload, SqlValue};

#[derive(Error, Debug, PartialEq)]
pub enum FormError {
    #[error("Field '{field}' expects {expected}, got '{value}'")]
    InvalidValue {
        field: String,
        value: String,
        expected: &'static str,
    },
}

/// Add forms only hint at example values; edit forms carry the record's current values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit,
}

/// Seed value for a field before the user touches it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(Option<String>),
    /// Text shown as a placeholder hint only.
    Placeholder(Option<String>),
    /// Text pre-filled into the input.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub name: String,
    pub declared_type: String,
    pub family: TypeFamily,
    pub input_type: &'static str,
    pub step: Option<&'static str>,
    pub value: String,
    pub placeholder: String,
    pub checked: bool,
    #[serde(skip)]
    pub default: FieldDefault,
    #[serde(skip)]
    pub user_type: Option<String>,
}

impl FormField {
    fn new(column: &ColumnDescriptor, default: FieldDefault) -> Self {
        let family = classify(&column.declared_type);
        let step = match family {
            TypeFamily::Integer => Some("1"),
            TypeFamily::Decimal => Some("any"),
            _ => None,
        };
        let (value, placeholder, checked) = match &default {
            FieldDefault::Integer(v) => (v.to_string(), String::new(), false),
            FieldDefault::Decimal(v) => (v.to_string(), String::new(), false),
            FieldDefault::Boolean(v) => (String::new(), String::new(), *v),
            FieldDefault::Date(v) => (v.clone().unwrap_or_default(), String::new(), false),
            FieldDefault::Placeholder(hint) => (
                String::new(),
                hint.as_ref()
                    .map(|h| format!("e.g. {h}"))
                    .unwrap_or_default(),
                false,
            ),
            FieldDefault::Text(v) => (v.clone(), String::new(), false),
        };
        Self {
            name: column.name.clone(),
            declared_type: column.declared_type.clone(),
            family,
            input_type: family.input_type(&column.declared_type),
            step,
            value,
            placeholder,
            checked,
            default,
            user_type: column.user_type.clone(),
        }
    }
}

/// Builds one field per column, seeded from `sample` (a row keyed by column name).
pub fn build_form(
    columns: &[ColumnDescriptor],
    sample: Option<&HashMap<String, Value>>,
    mode: FormMode,
) -> Vec<FormField> {
    columns
        .iter()
        .map(|column| {
            let example = sample.and_then(|row| row.get(&column.name));
            let default = field_default(column, example, mode);
            FormField::new(column, default)
        })
        .collect()
}

fn field_default(column: &ColumnDescriptor, example: Option<&Value>, mode: FormMode) -> FieldDefault {
    match classify(&column.declared_type) {
        TypeFamily::Integer => FieldDefault::Integer(example.map(safe_int).unwrap_or(0)),
        TypeFamily::Decimal => FieldDefault::Decimal(example.map(safe_float).unwrap_or(0.0)),
        TypeFamily::Boolean => FieldDefault::Boolean(example.is_some_and(truthy)),
        TypeFamily::Date => FieldDefault::Date(
            example
                .and_then(cell_text)
                .and_then(|text| date_input_value(&text, &column.declared_type)),
        ),
        TypeFamily::Text => {
            let text = example.and_then(cell_text);
            match mode {
                FormMode::Add => FieldDefault::Placeholder(text),
                FormMode::Edit => FieldDefault::Text(text.unwrap_or_default()),
            }
        }
    }
}

/// Integer conversion that falls back to zero on null or non-numeric values.
pub fn safe_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Float conversion that falls back to zero on null or non-numeric values.
pub fn safe_float(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => is_truthy_text(s),
        _ => false,
    }
}

pub fn is_truthy_text(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1" | "on" | "active"
    )
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];
    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn is_timestamp_type(declared_type: &str) -> bool {
    declared_type.to_ascii_lowercase().contains("timestamp")
}

// Formats a stored value the way the browser's date/datetime-local input expects it.
fn date_input_value(text: &str, declared_type: &str) -> Option<String> {
    let parsed = parse_timestamp(text)?;
    if is_timestamp_type(declared_type) {
        Some(parsed.format("%Y-%m-%dT%H:%M:%S").to_string())
    } else {
        Some(parsed.format("%Y-%m-%d").to_string())
    }
}

/// Turns submitted form values into a payload, converting each field by its family.
///
/// Empty input becomes NULL, except checkboxes where absence means false.
pub fn payload_from_submission(
    fields: &[FormField],
    submitted: &HashMap<String, String>,
) -> Result<RecordPayload, FormError> {
    let mut payload = RecordPayload::new();
    for field in fields {
        let raw = submitted.get(&field.name).map(|s| s.trim()).unwrap_or("");
        let invalid = |expected: &'static str| FormError::InvalidValue {
            field: field.name.clone(),
            value: raw.to_string(),
            expected,
        };

        let value = match field.family {
            TypeFamily::Boolean => SqlValue::Bool(is_truthy_text(raw)),
            _ if raw.is_empty() => SqlValue::Null,
            TypeFamily::Integer => raw
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|_| invalid("a whole number"))?,
            TypeFamily::Decimal => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(SqlValue::Float)
                .ok_or_else(|| invalid("a number"))?,
            TypeFamily::Date => {
                let parsed = parse_timestamp(raw).ok_or_else(|| invalid("a date"))?;
                if is_timestamp_type(&field.declared_type) {
                    SqlValue::Timestamp(parsed)
                } else {
                    SqlValue::Date(parsed.date())
                }
            }
            TypeFamily::Text => SqlValue::Text(raw.to_string()),
        };
        payload.set(&field.name, value);
        if let Some(user_type) = &field.user_type {
            payload.cast_to(&field.name, user_type);
        }
    }
    Ok(payload)
}

/// A table row as a column-name map, as consumed by [`build_form`].
pub fn row_map(columns: &[String], row: &[Value]) -> HashMap<String, Value> {
    columns.iter().cloned().zip(row.iter().cloned()).collect()
}
