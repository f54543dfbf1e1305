//! Power state of an existing ECS instance.
//!
//! The resource id is `state:<instance id>`. Deleting it leaves the
//! instance as it is.

use async_trait::async_trait;
use serde_json::Value;
use tfdispatch::validator::{AttributeValidators, StringInValidator};
use tfdispatch::{
    parse_composite_id, ConvertMode, DispatchError, FieldSpec, ResourceData, ResourceDescriptor,
    ResourceService, Result, SdkCall, StateRefresh,
};

use crate::api::{Client, Service};
use crate::resources::{describe, first_item, id_params};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("instance_id").required().force_new(),
    FieldSpec::string("action")
        .required()
        .description("Start, Stop or ForceStop"),
    FieldSpec::string("stopped_mode")
        .optional()
        .description("KeepCharging or StopCharging"),
    FieldSpec::string("status").computed(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_ecs_instance_state", FIELDS)
        .with_description("Starts or stops an ECS instance");

const ID_PREFIX: &str = "state";

fn instance_id_of(id: &str) -> Result<String> {
    let parts = parse_composite_id(id, 2)?;
    if parts[0] != ID_PREFIX {
        return Err(DispatchError::Validation(format!(
            "invalid id {:?}: expected {}:<instance id>",
            id, ID_PREFIX
        )));
    }
    Ok(parts[1].clone())
}

fn power_call(data: &ResourceData) -> Result<SdkCall> {
    let instance_id = data.require_string("instance_id")?.to_string();
    let action = data.require_string("action")?;
    let (api, target, force) = match action {
        "Start" => ("StartInstance", "RUNNING", false),
        "Stop" => ("StopInstance", "STOPPED", false),
        "ForceStop" => ("StopInstance", "STOPPED", true),
        other => {
            return Err(DispatchError::Validation(format!(
                "unsupported action {}",
                other
            )))
        }
    };

    let request_id = instance_id.clone();
    Ok(SdkCall::universal(Service::Ecs.action(api))
        .convert_mode(ConvertMode::Ignore)
        .lock_key(instance_id.clone())
        .before_call(move |d, params| {
            params.insert("InstanceId".to_string(), Value::from(request_id.as_str()));
            if force {
                params.insert("ForceStop".to_string(), Value::Bool(true));
            }
            if target == "STOPPED" {
                if let Some(mode) = d.get_string("stopped_mode") {
                    params.insert("StoppedMode".to_string(), Value::from(mode));
                }
            }
            Ok(true)
        })
        .after_call(move |d, _| {
            d.set_id(format!("{}:{}", ID_PREFIX, instance_id));
            Ok(())
        })
        .refresh(StateRefresh::new(&[target]).fail_states(&["ERROR"])))
}

pub struct EcsInstanceStateService {
    client: Client,
}

impl EcsInstanceStateService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceService for EcsInstanceStateService {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    async fn read_resource(&self, _data: &ResourceData, id: &str) -> Result<Value> {
        let instance_id = instance_id_of(id)?;
        let info = Service::Ecs.action("DescribeInstances");
        let response =
            describe(&self.client, &info, &id_params("InstanceIds.1", &instance_id), id).await?;
        first_item(&response, "Instances", id)
    }

    fn validators(&self) -> AttributeValidators {
        AttributeValidators::new()
            .rule(
                "action",
                StringInValidator {
                    allowed: &["Start", "Stop", "ForceStop"],
                    ignore_case: false,
                },
            )
            .rule(
                "stopped_mode",
                StringInValidator {
                    allowed: &["KeepCharging", "StopCharging"],
                    ignore_case: false,
                },
            )
    }

    fn create_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(vec![power_call(data)?])
    }

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        if !data.has_changes(&["action", "stopped_mode"]) {
            return Ok(Vec::new());
        }
        Ok(vec![power_call(data)?])
    }

    fn remove_resource(&self, _data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(Vec::new())
    }
}
