//! RequestBuilder: resource data -> remote request parameters

use crate::call::ContentType;
use crate::data::ResourceData;
use crate::error::{DispatchError, Result};
use crate::schema::{FieldKind, FieldSpec, ResourceDescriptor};
use crate::types::Dynamic;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Request parameters, keyed by remote field name
pub type Params = Map<String, Value>;

/// Which fields are converted automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvertMode {
    /// Every schema field, minus ignored and computed-only ones
    #[default]
    ConvertAll,
    /// Only the fields listed in the call's converts
    InConvert,
    /// Nothing; `before_call` fills the parameters by hand
    Ignore,
}

/// How a value is laid out in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvertType {
    /// Scalars as-is; lists and blocks follow the content type
    #[default]
    Default,
    /// Indexed keys: `Field.1`, `Field.2`, `Field.1.Sub`
    WithN,
    /// A single nested block flattened without index: `Field.Sub`
    ListN,
    JsonArray,
    /// A single nested block as one JSON object
    JsonObject,
    JsonObjectArray,
}

pub type RequestValueFn = fn(&ResourceData, &Dynamic) -> Option<Value>;

/// Per-field conversion rule
#[derive(Debug, Clone, Default)]
pub struct RequestConvert {
    pub target_field: Option<&'static str>,
    pub convert_type: ConvertType,
    pub convert: Option<RequestValueFn>,
    /// Read the value even when it did not change during an update
    pub force_get: bool,
    pub ignore: bool,
    /// First index used for `Field.N` keys, 1 when unset
    pub start_index: Option<usize>,
    pub next_level: HashMap<&'static str, RequestConvert>,
}

impl RequestConvert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, field: &'static str) -> Self {
        self.target_field = Some(field);
        self
    }

    pub fn convert_type(mut self, convert_type: ConvertType) -> Self {
        self.convert_type = convert_type;
        self
    }

    pub fn func(mut self, convert: RequestValueFn) -> Self {
        self.convert = Some(convert);
        self
    }

    pub fn force_get(mut self) -> Self {
        self.force_get = true;
        self
    }

    pub fn ignored() -> Self {
        Self {
            ignore: true,
            ..Self::default()
        }
    }

    pub fn start_index(mut self, index: usize) -> Self {
        self.start_index = Some(index);
        self
    }

    pub fn next_level(mut self, field: &'static str, convert: RequestConvert) -> Self {
        self.next_level.insert(field, convert);
        self
    }
}

pub type RequestConverts = HashMap<&'static str, RequestConvert>;

/// Converts resource data into a parameter map for one call
pub struct RequestBuilder<'a> {
    descriptor: &'a ResourceDescriptor,
    mode: ConvertMode,
    converts: &'a RequestConverts,
    content_type: ContentType,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(
        descriptor: &'a ResourceDescriptor,
        mode: ConvertMode,
        converts: &'a RequestConverts,
        content_type: ContentType,
    ) -> Self {
        Self {
            descriptor,
            mode,
            converts,
            content_type,
        }
    }

    pub fn build(&self, data: &ResourceData) -> Result<Params> {
        let mut params = Params::new();
        if self.mode == ConvertMode::Ignore {
            return Ok(params);
        }

        let default_convert = RequestConvert::default();
        for field in self.descriptor.fields {
            if field.ignore || field.is_computed_only() {
                continue;
            }
            let convert = match (self.mode, self.converts.get(field.name)) {
                (_, Some(c)) if c.ignore => continue,
                (_, Some(c)) => c,
                (ConvertMode::InConvert, None) => continue,
                (_, None) => &default_convert,
            };

            let value = if data.is_new_resource() {
                data.get_ok(field.name)
            } else if convert.force_get {
                data.get(field.name)
            } else if data.has_change(field.name) {
                data.get(field.name)
            } else {
                None
            };
            let Some(value) = value else {
                continue;
            };

            let target = convert
                .target_field
                .map(str::to_string)
                .unwrap_or_else(|| field.remote_name());

            let converted = match convert.convert {
                Some(f) => match f(data, value) {
                    Some(v) => v,
                    None => continue,
                },
                None => remote_value(data, field, convert, value)?,
            };

            tracing::trace!(field = field.name, target = %target, "converted request field");
            self.place(&mut params, field, convert, &target, converted)?;
        }

        Ok(params)
    }

    fn place(
        &self,
        params: &mut Params,
        field: &FieldSpec,
        convert: &RequestConvert,
        target: &str,
        value: Value,
    ) -> Result<()> {
        let start = convert.start_index.unwrap_or(1);
        let single_block = matches!(field.kind, FieldKind::Block { max_items: 1, .. });

        match self.content_type {
            ContentType::Default => match convert.convert_type {
                ConvertType::Default | ConvertType::WithN => {
                    put_flat(params, target, &value, start);
                }
                ConvertType::ListN => {
                    let first = match value {
                        Value::Array(mut items) if !items.is_empty() => items.remove(0),
                        Value::Array(_) => return Ok(()),
                        other => other,
                    };
                    put_flat(params, target, &first, start);
                }
                ConvertType::JsonArray
                | ConvertType::JsonObject
                | ConvertType::JsonObjectArray => {
                    let shaped = shape_json(convert.convert_type, single_block, value);
                    let encoded = serde_json::to_string(&shaped)
                        .map_err(|e| DispatchError::EncodingError(e.to_string()))?;
                    params.insert(target.to_string(), Value::String(encoded));
                }
            },
            ContentType::ApplicationJson => {
                let shaped = shape_json(convert.convert_type, single_block, value);
                put_nested(params, target, shaped);
            }
        }
        Ok(())
    }
}

fn shape_json(convert_type: ConvertType, single_block: bool, value: Value) -> Value {
    match (convert_type, value) {
        (ConvertType::JsonObject, Value::Array(mut items))
        | (ConvertType::ListN, Value::Array(mut items)) => {
            if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            }
        }
        (ConvertType::Default, Value::Array(mut items)) if single_block => {
            if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            }
        }
        (_, other) => other,
    }
}

/// Resource-data value -> JSON value with remote key names
fn remote_value(
    data: &ResourceData,
    field: &FieldSpec,
    convert: &RequestConvert,
    value: &Dynamic,
) -> Result<Value> {
    match (field.kind, value) {
        (FieldKind::Block { fields, .. }, Dynamic::List(items)) => items
            .iter()
            .map(|item| match item {
                Dynamic::Map(entry) => remote_object(data, fields, convert, entry),
                other => Err(DispatchError::TypeMismatch {
                    expected: "object".to_string(),
                    actual: other.type_name().to_string(),
                }),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Ok(value.to_json()),
    }
}

fn remote_object(
    data: &ResourceData,
    fields: &[FieldSpec],
    parent: &RequestConvert,
    entry: &HashMap<String, Dynamic>,
) -> Result<Value> {
    let default_convert = RequestConvert::default();
    let mut object = Map::new();
    for field in fields {
        if field.ignore || field.is_computed_only() {
            continue;
        }
        let convert = parent.next_level.get(field.name).unwrap_or(&default_convert);
        if convert.ignore {
            continue;
        }
        // zero values mean "unset" only on create; an update must be able to clear them
        let Some(value) = entry.get(field.name).filter(|v| {
            if data.is_new_resource() {
                !v.is_zero()
            } else {
                !v.is_null() && !v.is_unknown()
            }
        }) else {
            continue;
        };
        let target = convert
            .target_field
            .map(str::to_string)
            .unwrap_or_else(|| field.remote_name());
        let converted = match convert.convert {
            Some(f) => match f(data, value) {
                Some(v) => v,
                None => continue,
            },
            None => remote_value(data, field, convert, value)?,
        };
        // nested single blocks are objects, not one-element arrays
        let converted = match (field.kind, converted) {
            (FieldKind::Block { max_items: 1, .. }, Value::Array(mut items)) => {
                if items.is_empty() {
                    continue;
                }
                items.remove(0)
            }
            (_, other) => other,
        };
        object.insert(target, converted);
    }
    Ok(Value::Object(object))
}

/// Flat query layout: arrays become `key.N`, objects become `key.Sub`
pub fn put_flat(params: &mut Params, key: &str, value: &Value, start_index: usize) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                put_flat(params, &format!("{}.{}", key, idx + start_index), item, 1);
            }
        }
        Value::Object(map) => {
            for (sub, item) in map {
                put_flat(params, &format!("{}.{}", key, sub), item, 1);
            }
        }
        scalar => {
            params.insert(key.to_string(), scalar.clone());
        }
    }
}

/// JSON body layout: a dotted key nests into objects (`ClusterConfig.SubnetIds`)
pub fn put_nested(params: &mut Params, key: &str, value: Value) {
    if value.is_null() {
        return;
    }
    match key.split_once('.') {
        None => {
            let merge = matches!(
                (params.get(key), &value),
                (Some(Value::Object(_)), Value::Object(_))
            );
            if !merge {
                params.insert(key.to_string(), value);
            } else if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (params.get_mut(key), value)
            {
                existing.extend(incoming);
            }
        }
        Some((head, rest)) => {
            let slot = params
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                put_nested(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeType;
    use serde_json::json;

    const ENTRY_FIELDS: &[FieldSpec] = &[
        FieldSpec::string("entry").required(),
        FieldSpec::string("description").optional(),
    ];
    const TAG_FIELDS: &[FieldSpec] = &[
        FieldSpec::string("key").required(),
        FieldSpec::string("value").required(),
    ];
    const CONFIG_FIELDS: &[FieldSpec] = &[
        FieldSpec::list("subnet_ids", AttributeType::String).required(),
        FieldSpec::bool("api_server_public_access_enabled").optional(),
    ];
    const FIELDS: &[FieldSpec] = &[
        FieldSpec::string("acl_name").optional(),
        FieldSpec::string("description").optional(),
        FieldSpec::string("project_name").optional().ignore(),
        FieldSpec::string("status").computed(),
        FieldSpec::set_block("acl_entries", ENTRY_FIELDS).optional(),
        FieldSpec::set_block("tags", TAG_FIELDS).optional(),
        FieldSpec::list("security_group_ids", AttributeType::String).optional(),
        FieldSpec::single_block("cluster_config", CONFIG_FIELDS).optional(),
        FieldSpec::string("billing_type").optional(),
    ];
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor::new("test", FIELDS);

    fn entry(cidr: &str, description: &str) -> Dynamic {
        let mut map = HashMap::new();
        map.insert("entry".to_string(), Dynamic::string(cidr));
        map.insert("description".to_string(), Dynamic::string(description));
        Dynamic::Map(map)
    }

    fn config_block() -> Dynamic {
        let mut map = HashMap::new();
        map.insert(
            "subnet_ids".to_string(),
            Dynamic::from(vec!["subnet-1", "subnet-2"]),
        );
        map.insert(
            "api_server_public_access_enabled".to_string(),
            Dynamic::Bool(true),
        );
        Dynamic::List(vec![Dynamic::Map(map)])
    }

    fn create_data() -> ResourceData {
        let mut config = HashMap::new();
        config.insert("acl_name".to_string(), Dynamic::string("acc-test-acl"));
        config.insert("description".to_string(), Dynamic::string(""));
        config.insert("project_name".to_string(), Dynamic::string("default"));
        config.insert("status".to_string(), Dynamic::string("Active"));
        config.insert(
            "acl_entries".to_string(),
            Dynamic::List(vec![entry("172.20.1.0/24", "first")]),
        );
        config.insert(
            "security_group_ids".to_string(),
            Dynamic::from(vec!["sg-1", "sg-2"]),
        );
        config.insert("cluster_config".to_string(), config_block());
        ResourceData::from_config(config)
    }

    #[test]
    fn convert_all_renames_and_expands_lists() {
        let converts = RequestConverts::new();
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::ConvertAll,
            &converts,
            ContentType::Default,
        )
        .build(&create_data())
        .unwrap();

        assert_eq!(params["AclName"], json!("acc-test-acl"));
        assert_eq!(params["AclEntries.1.Entry"], json!("172.20.1.0/24"));
        assert_eq!(params["AclEntries.1.Description"], json!("first"));
        assert_eq!(params["SecurityGroupIds.1"], json!("sg-1"));
        assert_eq!(params["SecurityGroupIds.2"], json!("sg-2"));
        assert!(!params.contains_key("Description"));
        assert!(!params.contains_key("ProjectName"));
        assert!(!params.contains_key("Status"));
    }

    #[test]
    fn in_convert_only_touches_listed_fields() {
        let mut converts = RequestConverts::new();
        converts.insert("acl_name", RequestConvert::new().target("Name"));
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::InConvert,
            &converts,
            ContentType::Default,
        )
        .build(&create_data())
        .unwrap();

        assert_eq!(params.len(), 1);
        assert_eq!(params["Name"], json!("acc-test-acl"));
    }

    #[test]
    fn ignore_mode_produces_empty_params() {
        let converts = RequestConverts::new();
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::Ignore,
            &converts,
            ContentType::Default,
        )
        .build(&create_data())
        .unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn convert_function_runs_before_target_placement() {
        fn billing_code(_: &ResourceData, v: &Dynamic) -> Option<Value> {
            match v.as_string()? {
                "PrePaid" => Some(json!(1)),
                "PostPaid" => Some(json!(2)),
                _ => None,
            }
        }
        let mut config = HashMap::new();
        config.insert("billing_type".to_string(), Dynamic::string("PostPaid"));
        let data = ResourceData::from_config(config);

        let mut converts = RequestConverts::new();
        converts.insert(
            "billing_type",
            RequestConvert::new().target("BillingMode").func(billing_code),
        );
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::ConvertAll,
            &converts,
            ContentType::Default,
        )
        .build(&data)
        .unwrap();
        assert_eq!(params["BillingMode"], json!(2));
        assert!(!params.contains_key("BillingType"));
    }

    #[test]
    fn json_body_nests_single_blocks_and_keeps_arrays() {
        let mut converts = RequestConverts::new();
        converts.insert(
            "security_group_ids",
            RequestConvert::new().target("ClusterConfig.SecurityGroupIds"),
        );
        converts.insert(
            "acl_entries",
            RequestConvert::new().convert_type(ConvertType::JsonObjectArray),
        );
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::ConvertAll,
            &converts,
            ContentType::ApplicationJson,
        )
        .build(&create_data())
        .unwrap();

        assert_eq!(
            params["ClusterConfig"]["SubnetIds"],
            json!(["subnet-1", "subnet-2"])
        );
        assert_eq!(
            params["ClusterConfig"]["SecurityGroupIds"],
            json!(["sg-1", "sg-2"])
        );
        assert_eq!(params["ClusterConfig"]["ApiServerPublicAccessEnabled"], json!(true));
        assert_eq!(
            params["AclEntries"],
            json!([{"Entry": "172.20.1.0/24", "Description": "first"}])
        );
    }

    #[test]
    fn list_n_flattens_single_block_without_index() {
        let mut converts = RequestConverts::new();
        converts.insert(
            "cluster_config",
            RequestConvert::new().convert_type(ConvertType::ListN),
        );
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::InConvert,
            &converts,
            ContentType::Default,
        )
        .build(&create_data())
        .unwrap();

        assert_eq!(params["ClusterConfig.SubnetIds.1"], json!("subnet-1"));
        assert_eq!(
            params["ClusterConfig.ApiServerPublicAccessEnabled"],
            json!(true)
        );
    }

    #[test]
    fn update_sends_changed_fields_and_force_get_fields() {
        let mut prior = HashMap::new();
        prior.insert("acl_name".to_string(), Dynamic::string("old"));
        prior.insert("description".to_string(), Dynamic::string("same"));
        let mut planned = prior.clone();
        planned.insert("acl_name".to_string(), Dynamic::string("new"));
        let data = ResourceData::for_update("acl-1", prior, planned);

        let mut converts = RequestConverts::new();
        converts.insert("description", RequestConvert::new().force_get());
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::ConvertAll,
            &converts,
            ContentType::Default,
        )
        .build(&data)
        .unwrap();

        assert_eq!(params["AclName"], json!("new"));
        assert_eq!(params["Description"], json!("same"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn update_sends_cleared_nested_values() {
        let prior = create_data().values().clone();
        let mut planned = prior.clone();
        let mut cleared = HashMap::new();
        cleared.insert(
            "subnet_ids".to_string(),
            Dynamic::from(vec!["subnet-1", "subnet-2"]),
        );
        cleared.insert(
            "api_server_public_access_enabled".to_string(),
            Dynamic::Bool(false),
        );
        planned.insert(
            "cluster_config".to_string(),
            Dynamic::List(vec![Dynamic::Map(cleared)]),
        );
        let data = ResourceData::for_update("cc-1", prior, planned);

        let mut converts = RequestConverts::new();
        converts.insert("cluster_config", RequestConvert::new());
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::InConvert,
            &converts,
            ContentType::ApplicationJson,
        )
        .build(&data)
        .unwrap();
        assert_eq!(
            params["ClusterConfig"]["ApiServerPublicAccessEnabled"],
            json!(false)
        );
    }

    #[test]
    fn json_array_on_flat_call_is_encoded_as_string() {
        let mut converts = RequestConverts::new();
        converts.insert(
            "security_group_ids",
            RequestConvert::new().convert_type(ConvertType::JsonArray),
        );
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            ConvertMode::InConvert,
            &converts,
            ContentType::Default,
        )
        .build(&create_data())
        .unwrap();
        assert_eq!(params["SecurityGroupIds"], json!(r#"["sg-1","sg-2"]"#));
    }
}
