//! NAT gateway
//!
//! Creation is serialized per VPC: the service rejects concurrent NAT
//! gateway changes inside one VPC.

use async_trait::async_trait;
use serde_json::{json, Value};
use tfdispatch::tags::{update_tag_calls, TagApi};
use tfdispatch::validator::{AttributeValidators, NumberRangeValidator, StringInValidator};
use tfdispatch::{
    ConvertMode, DispatchError, Dynamic, FieldSpec, OnError, RequestConvert, RequestConverts,
    ResourceData, ResourceDescriptor, ResourceService, ResponseConvert, ResponseConverts, Result,
    SdkCall, StateRefresh,
};

use crate::api::{Client, Service};
use crate::resources::{describe, first_item, id_params};

const TAG_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("key").required(),
    FieldSpec::string("value").required(),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("vpc_id").required().force_new(),
    FieldSpec::string("subnet_id").required().force_new(),
    FieldSpec::string("spec")
        .optional()
        .computed()
        .description("Small, Medium, Large or ExtraLarge"),
    FieldSpec::string("nat_gateway_name").optional(),
    FieldSpec::string("description").optional(),
    FieldSpec::string("billing_type")
        .optional()
        .computed()
        .force_new()
        .description("PrePaid or PostPaid"),
    FieldSpec::number("period").optional().ignore(),
    FieldSpec::string("project_name").optional().computed(),
    FieldSpec::set_block("tags", TAG_FIELDS).optional(),
    FieldSpec::string("status").computed(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_nat_gateway", FIELDS).with_description("Manages a NAT gateway");

const BILLING_TYPES: &[(&str, i64)] = &[("PrePaid", 1), ("PostPaid", 2)];

/// `"PostPaid"` -> `2`
fn billing_type_code(_: &ResourceData, value: &Dynamic) -> Option<Value> {
    let name = value.as_string()?;
    BILLING_TYPES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| Value::from(*code))
}

/// `2` -> `"PostPaid"`
fn billing_type_name(value: &Value) -> Dynamic {
    let code = value.as_i64().or_else(|| value.as_str().and_then(|s| s.parse().ok()));
    match code.and_then(|c| BILLING_TYPES.iter().find(|(_, code)| *code == c)) {
        Some((name, _)) => Dynamic::string(*name),
        None => Dynamic::from_json(value),
    }
}

fn available() -> StateRefresh {
    StateRefresh::new(&["Available"]).fail_states(&["Error"])
}

fn tag_api() -> TagApi {
    TagApi {
        field: "tags",
        tag: Service::NatGateway.action("TagResources"),
        untag: Service::NatGateway.action("UntagResources"),
        resource_type: Some("ngw"),
    }
}

pub struct NatGatewayService {
    client: Client,
}

impl NatGatewayService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceService for NatGatewayService {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    async fn read_resource(&self, _data: &ResourceData, id: &str) -> Result<Value> {
        let info = Service::NatGateway.action("DescribeNatGateways");
        let response = describe(&self.client, &info, &id_params("NatGatewayIds.1", id), id).await?;
        first_item(&response, "NatGateways", id)
    }

    fn response_converts(&self) -> ResponseConverts {
        let mut converts = ResponseConverts::new();
        converts.insert("BillingType", ResponseConvert::new().func(billing_type_name));
        converts
    }

    fn validators(&self) -> AttributeValidators {
        AttributeValidators::new()
            .rule(
                "billing_type",
                StringInValidator {
                    allowed: &["PrePaid", "PostPaid"],
                    ignore_case: false,
                },
            )
            .rule(
                "spec",
                StringInValidator {
                    allowed: &["Small", "Medium", "Large", "ExtraLarge"],
                    ignore_case: false,
                },
            )
            .rule(
                "period",
                NumberRangeValidator {
                    min: Some(1.0),
                    max: Some(36.0),
                },
            )
    }

    fn create_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let vpc_id = data.require_string("vpc_id")?.to_string();
        let mut converts = RequestConverts::new();
        converts.insert(
            "billing_type",
            RequestConvert::new().func(billing_type_code),
        );

        Ok(vec![SdkCall::universal(Service::NatGateway.action("CreateNatGateway"))
            .converts(converts)
            .lock_key(vpc_id)
            .before_call(|d, params| {
                if d.get_string("billing_type") == Some("PrePaid") {
                    let period = d.get_number("period").unwrap_or(1.0);
                    params.insert("Period".to_string(), json!(period as i64));
                    params.insert("PeriodUnit".to_string(), json!("Month"));
                }
                Ok(true)
            })
            .after_call(|d, response| {
                let id = response
                    .get("NatGatewayId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        DispatchError::Convert("CreateNatGateway returned no NatGatewayId".into())
                    })?;
                d.set_id(id);
                Ok(())
            })
            .refresh(available())])
    }

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let mut calls = Vec::new();
        if data.has_changes(&["nat_gateway_name", "description", "spec"]) {
            let mut converts = RequestConverts::new();
            converts.insert("nat_gateway_name", RequestConvert::new());
            converts.insert("description", RequestConvert::new());
            converts.insert("spec", RequestConvert::new());
            let vpc_id = data.require_string("vpc_id")?.to_string();
            calls.push(
                SdkCall::universal(Service::NatGateway.action("ModifyNatGatewayAttributes"))
                    .convert_mode(ConvertMode::InConvert)
                    .converts(converts)
                    .request_id_field("NatGatewayId")
                    .lock_key(vpc_id)
                    .refresh(available()),
            );
        }
        calls.extend(update_tag_calls(data, &tag_api()));
        Ok(calls)
    }

    fn remove_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let mut call = SdkCall::universal(Service::NatGateway.action("DeleteNatGateway"))
            .convert_mode(ConvertMode::Ignore)
            .request_id_field("NatGatewayId")
            .on_error(OnError::delete_retry())
            .refresh(StateRefresh::gone());
        if let Some(vpc_id) = data.get_string("vpc_id") {
            call = call.lock_key(vpc_id);
        }
        Ok(vec![call])
    }
}
