//! Field-spec driven metadata handler

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::{DocType, MetaHandler};
use crate::document::FieldError;
use crate::error::MetaError;
use crate::render::XmlRenderer;

/// Value shape of a custom metadata field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// `YYYY-MM-DD`; timestamps are cut to the date
    Date,
    /// One of a fixed set of values
    Choice(&'static [&'static str]),
    /// Integer greater than zero, as number or numeric string
    PositiveInt,
    /// List of non-empty strings
    TextList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaField {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must carry a value when selected
    pub required: bool,
}

impl MetaField {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }

    fn normalize(&self, raw: &Value) -> Value {
        match (&self.kind, raw) {
            (FieldKind::Date, Value::String(s)) => Value::String(s.trim().split('T').next().unwrap_or("").to_string()),
            (FieldKind::PositiveInt, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => raw.clone(),
            },
            (FieldKind::TextList, Value::String(s)) => Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| Value::String(p.to_string()))
                    .collect(),
            ),
            (_, Value::String(s)) => Value::String(s.trim().to_string()),
            _ => raw.clone(),
        }
    }

    fn check(&self, value: Option<&Value>) -> Option<String> {
        let value = match value {
            None | Some(Value::Null) => return self.required.then(|| "is required".to_string()),
            Some(Value::String(s)) if s.is_empty() => return self.required.then(|| "is required".to_string()),
            Some(v) => v,
        };

        match (&self.kind, value) {
            (FieldKind::Text, Value::String(_)) => None,
            (FieldKind::Date, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .err()
                .map(|_| format!("'{}' is not a valid date", s)),
            (FieldKind::Choice(allowed), Value::String(s)) => {
                (!allowed.contains(&s.as_str())).then(|| format!("must be one of: {}", allowed.join(", ")))
            }
            (FieldKind::PositiveInt, Value::Number(n)) => match n.as_i64() {
                Some(i) if i > 0 => None,
                _ => Some("must be a positive integer".to_string()),
            },
            (FieldKind::TextList, Value::Array(items)) => {
                if items.iter().all(|i| i.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false)) {
                    if self.required && items.is_empty() {
                        Some("is required".to_string())
                    } else {
                        None
                    }
                } else {
                    Some("must be a list of non-empty strings".to_string())
                }
            }
            (FieldKind::PositiveInt, _) => Some("must be a positive integer".to_string()),
            (FieldKind::TextList, _) => Some("must be a list of non-empty strings".to_string()),
            _ => Some("must be a string".to_string()),
        }
    }
}

/// Handler described by a list of fields and a template name
#[derive(Debug, Clone)]
pub struct FieldSpecHandler {
    doc_type: DocType,
    template: &'static str,
    fields: Vec<MetaField>,
}

impl FieldSpecHandler {
    pub fn new(doc_type: DocType, template: &'static str, fields: Vec<MetaField>) -> Self {
        Self { doc_type, template, fields }
    }

    pub fn fields(&self) -> &[MetaField] {
        &self.fields
    }

    fn field(&self, name: &str) -> Option<&MetaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl MetaHandler for FieldSpecHandler {
    fn doc_type(&self) -> DocType {
        self.doc_type
    }

    fn to_template_object(&self, selected: &Map<String, Value>) -> Value {
        let mut object = Map::new();
        for (name, raw) in selected {
            match self.field(name) {
                Some(field) => {
                    object.insert(name.clone(), field.normalize(raw));
                }
                None => {
                    // kept so validation can report it
                    object.insert(name.clone(), raw.clone());
                }
            }
        }
        Value::Object(object)
    }

    fn validate(&self, object: &Value, selected: &[String]) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = selected
            .iter()
            .filter_map(|name| match self.field(name) {
                None => Some(FieldError::new(
                    name.as_str(),
                    format!("is not a {} metadata field", self.doc_type),
                )),
                Some(field) => field
                    .check(object.get(name.as_str()))
                    .map(|message| FieldError::new(name.as_str(), message)),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn to_xml(&self, object: &Value, renderer: &dyn XmlRenderer) -> Result<String, MetaError> {
        Ok(renderer.render(self.template, object)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler() -> FieldSpecHandler {
        FieldSpecHandler::new(
            DocType::Doc,
            "meta/doc",
            vec![
                MetaField::required("source", FieldKind::Text),
                MetaField::optional("pageCount", FieldKind::PositiveInt),
                MetaField::optional("status", FieldKind::Choice(&["open", "closed"])),
                MetaField::optional("authors", FieldKind::TextList),
                MetaField::optional("received", FieldKind::Date),
            ],
        )
    }

    fn selected(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalizes_values() {
        let input = json!({"source": "  Gazette ", "pageCount": "12", "authors": "a, b,", "received": "2018-05-11T00:00:00Z"});
        let object = handler().to_template_object(input.as_object().unwrap());
        assert_eq!(
            object,
            json!({"source": "Gazette", "pageCount": 12, "authors": ["a", "b"], "received": "2018-05-11"})
        );
        handler()
            .validate(&object, &selected(&["source", "pageCount", "authors", "received"]))
            .unwrap();
    }

    #[test]
    fn test_collects_field_errors() {
        let input = json!({"source": "", "pageCount": -3, "status": "pending", "colour": "red"});
        let h = handler();
        let object = h.to_template_object(input.as_object().unwrap());
        let errors = h
            .validate(&object, &selected(&["source", "pageCount", "status", "colour"]))
            .unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["source", "pageCount", "status", "colour"]);
        assert_eq!(errors[2].message, "must be one of: open, closed");
    }

    #[test]
    fn test_only_selected_fields_validated() {
        let object = json!({"pageCount": "abc"});
        assert!(handler().validate(&object, &selected(&[])).is_ok());
        assert!(handler().validate(&object, &selected(&["pageCount"])).is_err());
    }

    #[test]
    fn test_optional_field_may_be_empty() {
        let object = json!({"received": ""});
        assert!(handler().validate(&object, &selected(&["received"])).is_ok());
    }
}
