use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Messages collected per field, serialized as `{field: [msg, ...]}`.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

/// A request value that should be a string. Any other JSON value is kept so
/// it is reported as a field error alongside missing fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Text(String),
    Other(serde_json::Value),
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Presence checks over string inputs; all failures are reported at once.
#[derive(Debug, Default)]
pub struct Required {
    errors: FieldErrors,
}

impl Required {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trimmed value, or an empty string after recording an error.
    pub fn field(&mut self, name: &'static str, value: Option<&str>) -> String {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => {
                self.errors.push(name, format!("{name} is a required field"));
                String::new()
            }
        }
    }

    /// Like [`Required::field`] for JSON input; non-string values are errors.
    pub fn text(&mut self, name: &'static str, value: Option<&Input>) -> String {
        match value {
            Some(Input::Text(s)) => self.field(name, Some(s)),
            Some(Input::Other(_)) => {
                self.errors.push(name, format!("{name} must be a string"));
                String::new()
            }
            None => self.field(name, None),
        }
    }

    pub fn error(&mut self, name: &'static str, message: impl Into<String>) {
        self.errors.push(name, message);
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_missing_field() {
        let mut v = Required::new();
        v.field("name", None);
        v.field("email", Some("   "));
        let Err(AppError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["email", "name"]);
    }

    #[test]
    fn non_string_json_values_are_field_errors() {
        let body: std::collections::HashMap<String, Input> =
            serde_json::from_str(r#"{"name": ["A"], "email": 5, "ok": " x "}"#).unwrap();
        let mut v = Required::new();
        v.text("name", body.get("name"));
        v.text("email", body.get("email"));
        assert_eq!(v.text("ok", body.get("ok")), "x");
        v.text("missing", None);
        let Err(AppError::Validation(errors)) = v.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({
                "email": ["email must be a string"],
                "missing": ["missing is a required field"],
                "name": ["name must be a string"],
            })
        );
    }

    #[test]
    fn trims_present_values() {
        let mut v = Required::new();
        assert_eq!(v.field("email", Some(" a@x.com ")), "a@x.com");
        assert!(v.finish().is_ok());
    }
}
