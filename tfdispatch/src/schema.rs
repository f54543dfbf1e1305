//! Static resource descriptors
//!
//! Every resource and data source declares its attributes once, as a
//! `&'static [FieldSpec]` table. The dispatcher reads the table to build
//! requests, to decide which response keys are written back, and to validate
//! configuration.

use crate::error::{DispatchError, Result};
use crate::naming::to_pascal_case;
use crate::types::{Diagnostics, Dynamic};
use std::collections::{HashMap, HashSet};

/// Scalar attribute types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
}

impl AttributeType {
    fn accepts(&self, value: &Dynamic) -> bool {
        matches!(
            (self, value),
            (_, Dynamic::Null)
                | (_, Dynamic::Unknown)
                | (AttributeType::String, Dynamic::String(_))
                | (AttributeType::Number, Dynamic::Number(_))
                | (AttributeType::Bool, Dynamic::Bool(_))
        )
    }
}

/// Shape of an attribute
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Scalar(AttributeType),
    List(AttributeType), // Ordered, allows duplicates
    Set(AttributeType),  // Unordered, no duplicates
    Map(AttributeType),  // String keys only
    /// Nested block, stored as a list of objects (list-of-one for single blocks)
    Block {
        fields: &'static [FieldSpec],
        max_items: usize,
        set: bool,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub remote: Option<&'static str>,
    pub kind: FieldKind,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub ignore: bool,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            remote: None,
            kind,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            ignore: false,
            description: "",
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar(AttributeType::String))
    }

    pub const fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar(AttributeType::Number))
    }

    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar(AttributeType::Bool))
    }

    pub const fn list(name: &'static str, element: AttributeType) -> Self {
        Self::new(name, FieldKind::List(element))
    }

    pub const fn set(name: &'static str, element: AttributeType) -> Self {
        Self::new(name, FieldKind::Set(element))
    }

    pub const fn map(name: &'static str, element: AttributeType) -> Self {
        Self::new(name, FieldKind::Map(element))
    }

    pub const fn block(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self::new(
            name,
            FieldKind::Block {
                fields,
                max_items: 0,
                set: false,
            },
        )
    }

    pub const fn set_block(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self::new(
            name,
            FieldKind::Block {
                fields,
                max_items: 0,
                set: true,
            },
        )
    }

    /// A block holding at most one object
    pub const fn single_block(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self::new(
            name,
            FieldKind::Block {
                fields,
                max_items: 1,
                set: false,
            },
        )
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn optional(self) -> Self {
        Self {
            optional: true,
            ..self
        }
    }

    pub const fn computed(self) -> Self {
        Self {
            computed: true,
            ..self
        }
    }

    pub const fn force_new(self) -> Self {
        Self {
            force_new: true,
            ..self
        }
    }

    pub const fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }

    /// Never sent to the remote API
    pub const fn ignore(self) -> Self {
        Self {
            ignore: true,
            ..self
        }
    }

    pub const fn remote(self, remote: &'static str) -> Self {
        Self {
            remote: Some(remote),
            ..self
        }
    }

    pub const fn description(self, description: &'static str) -> Self {
        Self {
            description,
            ..self
        }
    }

    pub fn remote_name(&self) -> String {
        match self.remote {
            Some(remote) => remote.to_string(),
            None => to_pascal_case(self.name),
        }
    }

    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    pub fn is_set(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Set(_) | FieldKind::Block { set: true, .. }
        )
    }

    pub fn nested_fields(&self) -> Option<&'static [FieldSpec]> {
        match self.kind {
            FieldKind::Block { fields, .. } => Some(fields),
            _ => None,
        }
    }

    fn check_value(&self, value: &Dynamic, path: &str, diags: &mut Diagnostics) {
        let ok = match (&self.kind, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (FieldKind::Scalar(t), v) => t.accepts(v),
            (FieldKind::List(t), Dynamic::List(items))
            | (FieldKind::Set(t), Dynamic::List(items)) => items.iter().all(|i| t.accepts(i)),
            (FieldKind::Map(t), Dynamic::Map(entries)) => entries.values().all(|v| t.accepts(v)),
            (FieldKind::Block { fields, max_items, .. }, Dynamic::List(items)) => {
                if *max_items > 0 && items.len() > *max_items {
                    diags.add_attribute_error(
                        path,
                        format!("Too many {} blocks", self.name),
                        format!("No more than {} blocks are allowed", max_items),
                    );
                }
                for (idx, item) in items.iter().enumerate() {
                    match item {
                        Dynamic::Map(values) => {
                            check_values(fields, values, &format!("{}.{}", path, idx), diags)
                        }
                        other => diags.add_attribute_error(
                            path,
                            format!("Type mismatch for field: {}", path),
                            format!("Block elements must be objects, got {}", other.type_name()),
                        ),
                    }
                }
                true
            }
            _ => false,
        };

        if !ok {
            diags.add_attribute_error(
                path,
                format!("Type mismatch for field: {}", path),
                format!(
                    "Field '{}' expects {:?} but got {}",
                    path,
                    self.kind_name(),
                    value.type_name()
                ),
            );
        }
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            FieldKind::Scalar(AttributeType::String) => "string",
            FieldKind::Scalar(AttributeType::Number) => "number",
            FieldKind::Scalar(AttributeType::Bool) => "bool",
            FieldKind::List(_) => "list",
            FieldKind::Set(_) => "set",
            FieldKind::Map(_) => "map",
            FieldKind::Block { .. } => "block",
        }
    }
}

fn check_values(
    fields: &[FieldSpec],
    values: &HashMap<String, Dynamic>,
    prefix: &str,
    diags: &mut Diagnostics,
) {
    let path_of = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    for field in fields {
        let present = values.get(field.name).map(|v| !v.is_null()).unwrap_or(false);
        if field.required && !present {
            let path = path_of(field.name);
            diags.add_attribute_error(
                &path,
                format!("Missing required field: {}", path),
                format!("The field '{}' is required but was not provided", path),
            );
        }
    }

    for (name, value) in values {
        let path = path_of(name);
        match fields.iter().find(|f| f.name == name) {
            Some(field) => field.check_value(value, &path, diags),
            None => diags.add_attribute_error(
                &path,
                format!("Unknown field: {}", path),
                format!("The field '{}' is not defined in the schema", path),
            ),
        }
    }
}

/// Static declaration of one resource or data source
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
}

impl ResourceDescriptor {
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self {
            name,
            description: "",
            fields,
        }
    }

    pub const fn with_description(self, description: &'static str) -> Self {
        Self {
            description,
            ..self
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names must be unique at every nesting level
    pub fn validate(&self) -> Result<()> {
        fn walk(resource: &str, fields: &[FieldSpec]) -> Result<()> {
            let mut seen = HashSet::new();
            for field in fields {
                if !seen.insert(field.name) {
                    return Err(DispatchError::Custom(format!(
                        "duplicate field '{}' in {}",
                        field.name, resource
                    )));
                }
                if field.required && field.computed {
                    return Err(DispatchError::Custom(format!(
                        "field '{}' in {} cannot be both required and computed",
                        field.name, resource
                    )));
                }
                if let Some(nested) = field.nested_fields() {
                    walk(resource, nested)?;
                }
            }
            Ok(())
        }
        walk(self.name, self.fields)
    }

    /// Checks required fields, value types and unknown keys of a configuration
    pub fn validate_config(&self, config: &HashMap<String, Dynamic>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let values: HashMap<String, Dynamic> = config
            .iter()
            .filter(|(k, _)| k.as_str() != "id")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        check_values(self.fields, &values, "", &mut diags);
        diags
    }

    pub fn force_new_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.force_new)
    }
}
