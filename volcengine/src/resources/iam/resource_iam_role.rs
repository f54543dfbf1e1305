//! IAM role. The role name is the resource id.

use async_trait::async_trait;
use serde_json::Value;
use tfdispatch::response::converters;
use tfdispatch::validator::{AttributeValidators, NumberRangeValidator, StringLengthValidator};
use tfdispatch::{
    ConvertMode, DispatchError, FieldSpec, OnError, RequestConvert, RequestConverts, ResourceData,
    ResourceDescriptor, ResourceService, ResponseConvert, ResponseConverts, Result, SdkCall,
};

use crate::api::{Client, Service};
use crate::resources::{describe, id_params};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("role_name").required().force_new(),
    FieldSpec::string("display_name").optional(),
    FieldSpec::string("description").optional(),
    FieldSpec::string("trust_policy_document")
        .required()
        .description("JSON trust policy; compared by value, not by text"),
    FieldSpec::number("max_session_duration").optional().computed(),
    FieldSpec::string("trn").computed(),
    FieldSpec::string("role_id").computed(),
    FieldSpec::string("create_date").computed(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_iam_role", FIELDS).with_description("Manages an IAM role");

/// Canonical text of a JSON document; `None` when it does not parse
fn normalize_policy(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| serde_json::to_string(&v).ok())
}

pub struct IamRoleService {
    client: Client,
}

impl IamRoleService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceService for IamRoleService {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    async fn read_resource(&self, _data: &ResourceData, id: &str) -> Result<Value> {
        let info = Service::Iam.action("GetRole");
        let response = describe(&self.client, &info, &id_params("RoleName", id), id).await?;
        match response.get("Role") {
            Some(role) if role.is_object() => Ok(role.clone()),
            _ => Err(DispatchError::NotFound(id.to_string())),
        }
    }

    /// Roles have no lifecycle status
    async fn resource_status(&self, _data: &ResourceData, _id: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn response_converts(&self) -> ResponseConverts {
        let mut converts = ResponseConverts::new();
        converts.insert("TrustPolicyDocument", ResponseConvert::ignored());
        converts.insert("Trn", ResponseConvert::new().target("trn"));
        converts.insert("RoleId", ResponseConvert::new().func(converters::number_to_string));
        converts
    }

    /// Keeps the configured policy text while it is equivalent to the remote one
    fn after_read(&self, data: &mut ResourceData, raw: &Value) -> Result<()> {
        let Some(remote) = raw.get("TrustPolicyDocument").and_then(Value::as_str) else {
            return Ok(());
        };
        let local = data.get_string("trust_policy_document").and_then(normalize_policy);
        if local.is_none() || local != normalize_policy(remote) {
            data.set("trust_policy_document", remote);
        }
        Ok(())
    }

    fn validators(&self) -> AttributeValidators {
        AttributeValidators::new()
            .rule(
                "role_name",
                StringLengthValidator {
                    min: Some(1),
                    max: Some(64),
                },
            )
            .rule(
                "max_session_duration",
                NumberRangeValidator {
                    min: Some(3600.0),
                    max: Some(43200.0),
                },
            )
    }

    fn create_resource(&self, _data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(vec![SdkCall::universal(Service::Iam.action("CreateRole"))
            .before_call(|d, _| {
                let policy = d.require_string("trust_policy_document")?;
                normalize_policy(policy).map(|_| true).ok_or_else(|| {
                    DispatchError::Validation("trust_policy_document is not valid JSON".into())
                })
            })
            .after_call(|d, _| {
                let name = d.require_string("role_name")?.to_string();
                d.set_id(name);
                Ok(())
            })])
    }

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        if !data.has_changes(&[
            "display_name",
            "description",
            "trust_policy_document",
            "max_session_duration",
        ]) {
            return Ok(Vec::new());
        }
        let mut converts = RequestConverts::new();
        converts.insert("display_name", RequestConvert::new().target("NewDisplayName"));
        converts.insert("description", RequestConvert::new());
        converts.insert("trust_policy_document", RequestConvert::new());
        converts.insert("max_session_duration", RequestConvert::new());
        Ok(vec![SdkCall::universal(Service::Iam.action("UpdateRole"))
            .convert_mode(ConvertMode::InConvert)
            .converts(converts)
            .request_id_field("RoleName")])
    }

    fn remove_resource(&self, _data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(vec![SdkCall::universal(Service::Iam.action("DeleteRole"))
            .convert_mode(ConvertMode::Ignore)
            .request_id_field("RoleName")
            .on_error(OnError::delete_retry())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use serde_json::json;
    use std::collections::HashMap;
    use tfdispatch::{Dynamic, Params};

    const POLICY: &str = r#"{"Statement":[{"Effect":"Allow","Action":["sts:AssumeRole"],"Principal":{"Service":["ecs"]}}]}"#;

    fn service() -> IamRoleService {
        IamRoleService::new(create_test_client("http://127.0.0.1:1"))
    }

    #[test]
    fn policy_normalization_ignores_whitespace_and_key_order() {
        let pretty = "{\n  \"b\": 1,\n  \"a\": [1, 2]\n}";
        assert_eq!(normalize_policy(pretty), normalize_policy(r#"{"a":[1,2],"b":1}"#));
        assert!(normalize_policy("not json").is_none());
    }

    #[test]
    fn equivalent_remote_policy_keeps_local_text() {
        let pretty = "{ \"Statement\": [ { \"Effect\": \"Allow\", \"Action\": [\"sts:AssumeRole\"], \"Principal\": { \"Service\": [\"ecs\"] } } ] }";
        let mut config = HashMap::new();
        config.insert("trust_policy_document".to_string(), Dynamic::string(pretty));
        let mut data = ResourceData::from_config(config);

        service()
            .after_read(&mut data, &json!({"TrustPolicyDocument": POLICY}))
            .unwrap();
        assert_eq!(data.get_string("trust_policy_document"), Some(pretty));

        service()
            .after_read(&mut data, &json!({"TrustPolicyDocument": "{\"Statement\":[]}"}))
            .unwrap();
        assert_eq!(data.get_string("trust_policy_document"), Some("{\"Statement\":[]}"));
    }

    #[test]
    fn invalid_policy_is_rejected_before_create() {
        let mut config = HashMap::new();
        config.insert("role_name".to_string(), Dynamic::string("ops"));
        config.insert("trust_policy_document".to_string(), Dynamic::string("{oops"));
        let data = ResourceData::from_config(config);

        let calls = service().create_resource(&data).unwrap();
        let hook = calls[0].before_call.as_ref().unwrap();
        let err = hook(&data, &mut Params::new()).unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn update_renames_display_name_parameter() {
        let mut prior = HashMap::new();
        prior.insert("role_name".to_string(), Dynamic::string("ops"));
        prior.insert("display_name".to_string(), Dynamic::string("Ops"));
        let mut planned = prior.clone();
        planned.insert("display_name".to_string(), Dynamic::string("Operators"));
        let data = ResourceData::for_update("ops", prior, planned);

        let calls = service().modify_resource(&data).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].converts["display_name"].target_field,
            Some("NewDisplayName")
        );
    }
}
