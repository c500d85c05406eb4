//! Field resolution for records written by older versions of the board.
//!
//! Each canonical field has an ordered list of candidate keys. The first key
//! holding a non-empty value wins. Resolution happens once, when a raw JSON
//! object becomes an [`Idea`]; nothing past that point knows the old names.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Idea, Status};

pub const ID_KEYS: &[&str] = &["id"];
pub const NAME_KEYS: &[&str] = &["name", "title", "titulo", "nombre"];
pub const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "descripcion"];
pub const CATEGORY_KEYS: &[&str] = &["category", "categoria"];
pub const STATUS_KEYS: &[&str] = &["status", "estado"];
pub const DATE_KEYS: &[&str] = &["date", "fecha"];
pub const NOTIFY_KEYS: &[&str] = &["notify", "notificar"];
pub const IMAGE_KEYS: &[&str] = &["image", "img", "imagen"];
pub const TIMESTAMP_KEYS: &[&str] = &["timestamp"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LegacyError {
    #[error("Expected an idea object, found {0}")]
    NotAnObject(&'static str),
}

impl TryFrom<Value> for Idea {
    type Error = LegacyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(resolve(&fields)),
            other => Err(LegacyError::NotAnObject(kind_of(&other))),
        }
    }
}

/// Build a canonical idea from a raw record, applying the fallback chains.
pub fn resolve(fields: &Map<String, Value>) -> Idea {
    Idea {
        id: first_text(fields, ID_KEYS).unwrap_or_default(),
        name: first_text(fields, NAME_KEYS).unwrap_or_default(),
        description: first_text(fields, DESCRIPTION_KEYS).unwrap_or_default(),
        category: first_text(fields, CATEGORY_KEYS).unwrap_or_default(),
        status: first_text(fields, STATUS_KEYS)
            .map(|s| Status::from_legacy(&s))
            .unwrap_or(Status::Paused),
        date: optional_text(fields, DATE_KEYS),
        notify: first_flag(fields, NOTIFY_KEYS),
        image: optional_text(fields, IMAGE_KEYS),
        timestamp: first_integer(fields, TIMESTAMP_KEYS).unwrap_or(0),
    }
}

fn first_text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match fields.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Like [`first_text`], but a key that is present with an empty string still
/// yields `Some("")`, so an optional field written empty reads back empty.
fn optional_text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_text(fields, keys).or_else(|| {
        keys.iter()
            .any(|key| fields.get(*key).and_then(Value::as_str) == Some(""))
            .then(String::new)
    })
}

fn first_flag(fields: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|key| match fields.get(*key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
        .unwrap_or(false)
}

fn first_integer(fields: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match fields.get(*key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
