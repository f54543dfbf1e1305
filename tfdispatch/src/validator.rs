use crate::error::{DispatchError, Result};
use crate::types::{Diagnostics, Dynamic};
use std::collections::HashMap;

pub trait Validator: Send + Sync {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics);
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        let Some(s) = value.as_string() else {
            return;
        };
        let len = s.chars().count();
        if self.min.is_some_and(|min| len < min) || self.max.is_some_and(|max| len > max) {
            diagnostics.add_attribute_error(
                attribute_path,
                format!(
                    "{} must be between {} and {} characters",
                    attribute_path,
                    self.min.unwrap_or(0),
                    self.max.map(|m| m.to_string()).unwrap_or_else(|| "any".into())
                ),
                format!("Got length {}", len),
            );
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl Validator for StringPatternValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        if let Some(s) = value.as_string() {
            if !self.pattern.is_match(s) {
                diagnostics.add_attribute_error(
                    attribute_path,
                    format!("{} must match {}", attribute_path, self.description),
                    format!("Value '{}' does not match pattern", s),
                );
            }
        }
    }
}

/// Value must be one of a fixed set, e.g. `tcp`/`udp`/`icmp`/`all`
pub struct StringInValidator {
    pub allowed: &'static [&'static str],
    pub ignore_case: bool,
}

impl Validator for StringInValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        let Some(s) = value.as_string() else {
            return;
        };
        let found = self.allowed.iter().any(|a| {
            if self.ignore_case {
                a.eq_ignore_ascii_case(s)
            } else {
                *a == s
            }
        });
        if !found {
            diagnostics.add_attribute_error(
                attribute_path,
                format!("{} must be one of {:?}", attribute_path, self.allowed),
                format!("Got '{}'", s),
            );
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Diagnostics) {
        if let Some(n) = value.as_number() {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must be at least {}", attribute_path, min),
                        format!("Got {}", n),
                    );
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.add_attribute_error(
                        attribute_path,
                        format!("{} must be at most {}", attribute_path, max),
                        format!("Got {}", n),
                    );
                }
            }
        }
    }
}

/// Ordered per-attribute validators of one resource type
#[derive(Default)]
pub struct AttributeValidators {
    rules: Vec<(&'static str, Box<dyn Validator>)>,
}

impl AttributeValidators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, attribute: &'static str, validator: impl Validator + 'static) -> Self {
        self.rules.push((attribute, Box::new(validator)));
        self
    }

    pub fn validate(&self, values: &HashMap<String, Dynamic>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for (attribute, validator) in &self.rules {
            if let Some(value) = values.get(*attribute).filter(|v| !v.is_null() && !v.is_unknown()) {
                validator.validate(value, attribute, &mut diags);
            }
        }
        diags
    }

    /// First failure as a validation error, for use inside `before_call`
    pub fn check(&self, values: &HashMap<String, Dynamic>) -> Result<()> {
        match self.validate(values).errors.into_iter().next() {
            Some(d) => Err(DispatchError::Validation(match d.detail {
                Some(detail) => format!("{}: {}", d.summary, detail),
                None => d.summary,
            })),
            None => Ok(()),
        }
    }
}
