use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single rejected field in a client document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Raised when a client document does not satisfy an entity schema.
///
/// All violations found in one document are reported together so a client
/// can fix its payload in a single round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// Names of every rejected field, in the order they were checked.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Walks the fields of a JSON object, recording every violation.
///
/// Accessors return a neutral value when a field is rejected; callers must
/// call [`Fields::finish`] before trusting anything they read.
pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    pub fn of(document: &'a Value) -> Result<Self, ValidationError> {
        match document {
            Value::Object(map) => Ok(Self {
                map,
                errors: Vec::new(),
            }),
            _ => Err(ValidationError::field("body", "must be a JSON object")),
        }
    }

    fn value(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.map.contains_key(field)
    }

    pub fn reject(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// A string that must be present and not blank.
    pub fn required_string(&mut self, field: &str) -> String {
        match self.value(field) {
            None | Some(Value::Null) => {
                self.reject(field, "is required");
                String::new()
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.reject(field, "is required");
                String::new()
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.reject(field, "must be a string");
                String::new()
            }
        }
    }

    /// Absent → `None`; `null` → `Some(None)`; string → `Some(Some(..))`.
    pub fn nullable_string(&mut self, field: &str) -> Option<Option<String>> {
        match self.value(field)? {
            Value::Null => Some(None),
            Value::String(s) => Some(Some(s.clone())),
            _ => {
                self.reject(field, "must be a string");
                None
            }
        }
    }

    /// A boolean that may be absent but never `null`.
    pub fn boolean(&mut self, field: &str) -> Option<bool> {
        match self.value(field)? {
            Value::Bool(b) => Some(*b),
            _ => {
                self.reject(field, "must be a boolean");
                None
            }
        }
    }

    /// A label from a fixed set, parsed with `parse`. `null` clears.
    pub fn nullable_label<T>(
        &mut self,
        field: &str,
        parse: fn(&str) -> Option<T>,
        allowed: &str,
    ) -> Option<Option<T>> {
        match self.value(field)? {
            Value::Null => Some(None),
            Value::String(s) => match parse(s) {
                Some(label) => Some(Some(label)),
                None => {
                    self.reject(field, &format!("must be one of {}", allowed));
                    None
                }
            },
            _ => {
                self.reject(field, &format!("must be one of {}", allowed));
                None
            }
        }
    }

    /// A finite, non-negative number that must be present.
    pub fn required_duration(&mut self, field: &str) -> f64 {
        match self.value(field) {
            None | Some(Value::Null) => {
                self.reject(field, "is required");
                0.0
            }
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() && v >= 0.0 => v,
                _ => {
                    self.reject(field, "must not be negative");
                    0.0
                }
            },
            Some(_) => {
                self.reject(field, "must be a number");
                0.0
            }
        }
    }

    pub fn nullable_uuid(&mut self, field: &str) -> Option<Uuid> {
        match self.value(field)? {
            Value::Null => None,
            Value::String(s) => match Uuid::parse_str(s) {
                Ok(id) => Some(id),
                Err(_) => {
                    self.reject(field, "must be a valid identifier");
                    None
                }
            },
            _ => {
                self.reject(field, "must be a valid identifier");
                None
            }
        }
    }

    pub fn nullable_timestamp(&mut self, field: &str) -> Option<DateTime<Utc>> {
        match self.value(field)? {
            Value::Null => None,
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(_) => {
                    self.reject(field, "must be an RFC 3339 timestamp");
                    None
                }
            },
            _ => {
                self.reject(field, "must be an RFC 3339 timestamp");
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}
