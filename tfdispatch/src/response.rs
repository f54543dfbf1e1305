//! ResponseMapper: remote response objects -> resource data attributes

use crate::data::ResourceData;
use crate::naming::to_snake_case;
use crate::schema::{AttributeType, FieldKind, FieldSpec, ResourceDescriptor};
use crate::types::Dynamic;
use serde_json::Value;
use std::collections::HashMap;

pub type ResponseValueFn = fn(&Value) -> Dynamic;

/// Per-field response rule, keyed by remote field name (or dotted path for nested keys)
#[derive(Debug, Clone, Default)]
pub struct ResponseConvert {
    pub target_field: Option<&'static str>,
    pub convert: Option<ResponseValueFn>,
    /// Keep the default snake_case key next to `target_field`
    pub keep_default: bool,
    pub ignore: bool,
}

impl ResponseConvert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, field: &'static str) -> Self {
        self.target_field = Some(field);
        self
    }

    pub fn func(mut self, convert: ResponseValueFn) -> Self {
        self.convert = Some(convert);
        self
    }

    pub fn keep_default(mut self) -> Self {
        self.keep_default = true;
        self
    }

    pub fn ignored() -> Self {
        Self {
            ignore: true,
            ..Self::default()
        }
    }
}

pub type ResponseConverts = HashMap<&'static str, ResponseConvert>;

pub struct ResponseMapper<'a> {
    converts: &'a ResponseConverts,
}

impl<'a> ResponseMapper<'a> {
    pub fn new(converts: &'a ResponseConverts) -> Self {
        Self { converts }
    }

    /// Rename and convert every key of a response object
    pub fn map(&self, response: &Value) -> HashMap<String, Dynamic> {
        match response {
            Value::Object(object) => self.map_object(object, ""),
            _ => HashMap::new(),
        }
    }

    fn map_object(
        &self,
        object: &serde_json::Map<String, Value>,
        path: &str,
    ) -> HashMap<String, Dynamic> {
        let mut out = HashMap::new();
        for (key, value) in object {
            let full_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            let convert = self
                .converts
                .get(full_path.as_str())
                .or_else(|| self.converts.get(key.as_str()));

            if convert.map(|c| c.ignore).unwrap_or(false) {
                continue;
            }

            let converted = match convert.and_then(|c| c.convert) {
                Some(f) => f(value),
                None => self.map_value(value, &full_path),
            };

            let default_name = to_snake_case(key);
            match convert.and_then(|c| c.target_field) {
                Some(target) => {
                    if convert.map(|c| c.keep_default).unwrap_or(false) {
                        out.insert(default_name, converted.clone());
                    }
                    out.insert(target.to_string(), converted);
                }
                None => {
                    out.insert(default_name, converted);
                }
            }
        }
        out
    }

    fn map_value(&self, value: &Value, path: &str) -> Dynamic {
        match value {
            Value::Object(object) => Dynamic::Map(self.map_object(object, path)),
            Value::Array(items) => Dynamic::List(
                items
                    .iter()
                    .map(|item| self.map_value(item, path))
                    .collect(),
            ),
            other => Dynamic::from_json(other),
        }
    }

    /// Writes mapped values for the fields the descriptor declares
    pub fn apply(
        &self,
        descriptor: &ResourceDescriptor,
        mapped: &HashMap<String, Dynamic>,
        data: &mut ResourceData,
    ) {
        for field in descriptor.fields {
            if let Some(value) = mapped.get(field.name) {
                data.set(field.name, fit_to_field(field, value));
            }
        }
    }

    /// Maps a response object straight into resource data
    pub fn write(&self, descriptor: &ResourceDescriptor, response: &Value, data: &mut ResourceData) {
        let mapped = self.map(response);
        self.apply(descriptor, &mapped, data);
    }
}

/// Coerces a mapped value into the shape a field expects: singleton objects
/// become list-of-one blocks, undeclared nested keys are dropped and scalars
/// are coerced to the declared type
pub fn fit_to_field(field: &FieldSpec, value: &Dynamic) -> Dynamic {
    match (field.kind, value) {
        (FieldKind::Block { fields, .. }, Dynamic::Map(entry)) => {
            Dynamic::List(vec![fit_object(fields, entry)])
        }
        (FieldKind::Block { fields, .. }, Dynamic::List(items)) => Dynamic::List(
            items
                .iter()
                .filter_map(|item| item.as_map().map(|entry| fit_object(fields, entry)))
                .collect(),
        ),
        (FieldKind::Block { .. }, Dynamic::Null) => Dynamic::List(vec![]),
        (FieldKind::Scalar(t), v) => coerce_scalar(t, v),
        (FieldKind::List(t), Dynamic::List(items)) | (FieldKind::Set(t), Dynamic::List(items)) => {
            Dynamic::List(items.iter().map(|i| coerce_scalar(t, i)).collect())
        }
        (FieldKind::List(_), Dynamic::Null) | (FieldKind::Set(_), Dynamic::Null) => {
            Dynamic::List(vec![])
        }
        (_, v) => v.clone(),
    }
}

fn fit_object(fields: &[FieldSpec], entry: &HashMap<String, Dynamic>) -> Dynamic {
    Dynamic::Map(
        fields
            .iter()
            .filter_map(|f| entry.get(f.name).map(|v| (f.name.to_string(), fit_to_field(f, v))))
            .collect(),
    )
}

fn coerce_scalar(t: AttributeType, value: &Dynamic) -> Dynamic {
    match (t, value) {
        (AttributeType::String, Dynamic::Number(_)) | (AttributeType::String, Dynamic::Bool(_)) => {
            value
                .to_param_string()
                .map(Dynamic::String)
                .unwrap_or(Dynamic::Null)
        }
        (AttributeType::Bool, Dynamic::String(s)) => match s.as_str() {
            "true" | "True" | "TRUE" => Dynamic::Bool(true),
            "false" | "False" | "FALSE" => Dynamic::Bool(false),
            _ => value.clone(),
        },
        (AttributeType::Number, Dynamic::String(s)) => s
            .parse::<f64>()
            .map(Dynamic::Number)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}

/// Stock converters for common response shapes
pub mod converters {
    use super::*;

    /// `"true"` / `"false"` strings and 0/1 numbers to bool
    pub fn bool_from_string(value: &Value) -> Dynamic {
        match value {
            Value::Bool(b) => Dynamic::Bool(*b),
            Value::String(s) => Dynamic::Bool(s.eq_ignore_ascii_case("true")),
            Value::Number(n) => Dynamic::Bool(n.as_f64().map(|n| n != 0.0).unwrap_or(false)),
            _ => Dynamic::Null,
        }
    }

    /// Numbers (account ids arrive as floats) to decimal strings
    pub fn number_to_string(value: &Value) -> Dynamic {
        match value {
            Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => Dynamic::String(i.to_string()),
                (_, Some(u), _) => Dynamic::String(u.to_string()),
                (_, _, Some(f)) => Dynamic::Number(f)
                    .to_param_string()
                    .map(Dynamic::String)
                    .unwrap_or(Dynamic::Null),
                _ => Dynamic::Null,
            },
            Value::String(s) => Dynamic::String(s.clone()),
            _ => Dynamic::Null,
        }
    }

    /// Objects to their JSON text
    pub fn json_encode(value: &Value) -> Dynamic {
        match value {
            Value::Null => Dynamic::Null,
            Value::String(s) => Dynamic::String(s.clone()),
            other => serde_json::to_string(other)
                .map(Dynamic::String)
                .unwrap_or(Dynamic::Null),
        }
    }

    /// JSON text fields decoded into values, keys untouched
    pub fn json_decode(value: &Value) -> Dynamic {
        match value {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map(|v| Dynamic::from_json(&v))
                .unwrap_or_else(|_| Dynamic::String(s.clone())),
            other => Dynamic::from_json(other),
        }
    }
}
