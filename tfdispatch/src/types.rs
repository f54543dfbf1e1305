//! Core value types
//!
//! `Dynamic` is the in-memory form of Terraform values as they flow between
//! resource data, request parameters and API responses.

use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Dynamic represents Terraform values that can be of any type
/// IMPORTANT: Prefer the typed accessors over matching directly
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    Bool(bool),
    /// Number value (all numbers are f64 to match Terraform)
    Number(f64),
    String(String),
    /// List of values; sets are lists whose order carries no meaning
    List(Vec<Dynamic>),
    /// Map of string keys to values (objects are represented as Maps)
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_str("__unknown__"),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid Dynamic value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value as f64))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Dynamic, E> {
                if value == "__unknown__" {
                    Ok(Dynamic::Unknown)
                } else {
                    Ok(Dynamic::String(value.to_string()))
                }
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut hashmap = HashMap::new();
                while let Some((key, value)) = map.next_entry()? {
                    hashmap.insert(key, value);
                }
                Ok(Dynamic::Map(hashmap))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

impl Dynamic {
    pub fn string(value: impl Into<String>) -> Self {
        Dynamic::String(value.into())
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Dynamic]> {
        match self {
            Dynamic::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    /// Zero values are treated as "not set" when building create requests
    pub fn is_zero(&self) -> bool {
        match self {
            Dynamic::Null | Dynamic::Unknown => true,
            Dynamic::Bool(b) => !*b,
            Dynamic::Number(n) => *n == 0.0,
            Dynamic::String(s) => s.is_empty(),
            Dynamic::List(l) => l.is_empty(),
            Dynamic::Map(m) => m.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    /// Render as the string form used by flat query parameters
    pub fn to_param_string(&self) -> Option<String> {
        match self {
            Dynamic::String(s) => Some(s.clone()),
            Dynamic::Bool(b) => Some(b.to_string()),
            Dynamic::Number(n) => Some(format_number(*n)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Dynamic::Null | Dynamic::Unknown => Value::Null,
            Dynamic::Bool(b) => Value::Bool(*b),
            Dynamic::Number(n) => number_to_json(*n),
            Dynamic::String(s) => Value::String(s.clone()),
            Dynamic::List(l) => Value::Array(l.iter().map(Dynamic::to_json).collect()),
            Dynamic::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Dynamic::Null,
            Value::Bool(b) => Dynamic::Bool(*b),
            Value::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => Dynamic::String(s.clone()),
            Value::Array(items) => Dynamic::List(items.iter().map(Dynamic::from_json).collect()),
            Value::Object(map) => Dynamic::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Dynamic::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Flatten into Terraform's legacy flatmap form (`entries.#`, `entries.0.cidr`)
    pub fn flatten_into(&self, prefix: &str, out: &mut BTreeMap<String, String>) {
        match self {
            Dynamic::Null | Dynamic::Unknown => {}
            Dynamic::List(items) => {
                out.insert(format!("{}.#", prefix), items.len().to_string());
                for (idx, item) in items.iter().enumerate() {
                    item.flatten_into(&format!("{}.{}", prefix, idx), out);
                }
            }
            Dynamic::Map(map) => {
                if !prefix.is_empty() {
                    out.insert(format!("{}.%", prefix), map.len().to_string());
                }
                for (key, value) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    value.flatten_into(&path, out);
                }
            }
            scalar => {
                if let Some(s) = scalar.to_param_string() {
                    out.insert(prefix.to_string(), s);
                }
            }
        }
    }

    /// Equality that ignores list order, used for set-typed attributes
    pub fn set_equals(&self, other: &Dynamic) -> bool {
        match (self, other) {
            (Dynamic::List(a), Dynamic::List(b)) => {
                a.len() == b.len()
                    && a.iter().all(|x| b.iter().any(|y| x.set_equals(y)))
                    && b.iter().all(|y| a.iter().any(|x| x.set_equals(y)))
            }
            (Dynamic::Map(a), Dynamic::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.set_equals(w)).unwrap_or(false))
            }
            _ => self == other,
        }
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Dynamic::String(value)
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Number(value)
    }
}

impl From<i64> for Dynamic {
    fn from(value: i64) -> Self {
        Dynamic::Number(value as f64)
    }
}

impl<T: Into<Dynamic>> From<Vec<T>> for Dynamic {
    fn from(values: Vec<T>) -> Self {
        Dynamic::List(values.into_iter().map(Into::into).collect())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Diagnostic represents a warning or error surfaced to the host
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: Option<String>,
    pub attribute: Option<String>,
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        self.errors.push(Diagnostic {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.map(Into::into),
            attribute: None,
        });
    }

    pub fn add_attribute_error(
        &mut self,
        attribute: impl Into<String>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.errors.push(Diagnostic {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: Some(detail.into()),
            attribute: Some(attribute.into()),
        });
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        self.warnings.push(Diagnostic {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.map(Into::into),
            attribute: None,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

impl From<DispatchError> for Diagnostics {
    fn from(err: DispatchError) -> Self {
        let mut diags = Diagnostics::new();
        diags.add_error(err.to_string(), None::<String>);
        diags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_integer_form() {
        let value = Dynamic::Number(2.0).to_json();
        assert_eq!(value, json!(2));
        assert_eq!(Dynamic::Number(2.5).to_json(), json!(2.5));
        assert_eq!(
            Dynamic::Number(2100000001.0).to_param_string().unwrap(),
            "2100000001"
        );
    }

    #[test]
    fn flatten_renders_counts_and_indices() {
        let mut entry = HashMap::new();
        entry.insert("entry".to_string(), Dynamic::string("172.20.1.0/24"));
        let mut root = HashMap::new();
        root.insert(
            "acl_entries".to_string(),
            Dynamic::List(vec![Dynamic::Map(entry)]),
        );
        root.insert("acl_name".to_string(), Dynamic::string("acc-test-acl"));

        let mut out = BTreeMap::new();
        Dynamic::Map(root).flatten_into("", &mut out);

        assert_eq!(out.get("acl_entries.#").unwrap(), "1");
        assert_eq!(out.get("acl_entries.0.entry").unwrap(), "172.20.1.0/24");
        assert_eq!(out.get("acl_name").unwrap(), "acc-test-acl");
    }

    #[test]
    fn set_equality_ignores_order() {
        let a = Dynamic::from(vec!["a", "b"]);
        let b = Dynamic::from(vec!["b", "a"]);
        assert!(a.set_equals(&b));
        assert_ne!(a, b);
        assert!(!a.set_equals(&Dynamic::from(vec!["a"])));
    }

    #[test]
    fn zero_values_are_detected() {
        assert!(Dynamic::Null.is_zero());
        assert!(Dynamic::string("").is_zero());
        assert!(Dynamic::Number(0.0).is_zero());
        assert!(!Dynamic::Bool(true).is_zero());
        assert!(!Dynamic::from(vec!["x"]).is_zero());
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let original = json!({"Name": "x", "Items": [1, {"Key": "k"}], "On": true});
        let back = Dynamic::from_json(&original).to_json();
        assert_eq!(back, original);
    }
}
