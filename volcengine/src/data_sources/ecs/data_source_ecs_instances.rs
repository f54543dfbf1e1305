//! `volcengine_ecs_instances`: compute instances, paged by continuation token

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tfdispatch::pagination::{value_at, NextTokenQuery};
use tfdispatch::{
    AttributeType, DataSourceInfo, DataSourceService, Dynamic, FieldSpec, Params,
    RequestConvert, ResourceDescriptor, Result,
};

use crate::api::{Client, Service};
use crate::resources::describe;

const TAG_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("key").computed(),
    FieldSpec::string("value").computed(),
];

const INSTANCE_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("id").computed(),
    FieldSpec::string("instance_id").computed(),
    FieldSpec::string("instance_name").computed(),
    FieldSpec::string("status").computed(),
    FieldSpec::string("zone_id").computed(),
    FieldSpec::string("vpc_id").computed(),
    FieldSpec::string("instance_type_id").computed(),
    FieldSpec::string("image_id").computed(),
    FieldSpec::string("os_name").computed(),
    FieldSpec::number("cpus").computed(),
    FieldSpec::number("memory_size").computed(),
    FieldSpec::string("created_at").computed(),
    FieldSpec::string("primary_ip_address").computed(),
    FieldSpec::string("subnet_id").computed(),
    FieldSpec::set_block("tags", TAG_FIELDS).computed(),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::set("ids", AttributeType::String).optional(),
    FieldSpec::string("instance_name").optional(),
    FieldSpec::string("status").optional(),
    FieldSpec::string("vpc_id").optional(),
    FieldSpec::string("zone_id").optional(),
    FieldSpec::string("project_name").optional(),
    FieldSpec::string("name_regex").optional().ignore(),
    FieldSpec::number("total_count").computed(),
    FieldSpec::block("instances", INSTANCE_FIELDS).computed(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_ecs_instances", FIELDS)
        .with_description("Lists compute instances");

/// Primary interface address and subnet are lifted out of the interface list
fn primary_interface(mapped: &mut HashMap<String, Dynamic>, item: &Value) -> Result<()> {
    if let Some(ip) = value_at(item, "NetworkInterfaces.0.PrimaryIpAddress").and_then(Value::as_str) {
        mapped.insert("primary_ip_address".to_string(), Dynamic::string(ip));
    }
    if let Some(subnet) = value_at(item, "NetworkInterfaces.0.SubnetId").and_then(Value::as_str) {
        mapped.insert("subnet_id".to_string(), Dynamic::string(subnet));
    }
    Ok(())
}

pub struct EcsInstancesDataSource {
    client: Client,
}

impl EcsInstancesDataSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceService for EcsInstancesDataSource {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn datasource_info(&self) -> DataSourceInfo {
        let mut info = DataSourceInfo::new("InstanceId", "instances");
        info.request_converts
            .insert("ids", RequestConvert::new().target("InstanceIds"));
        info.name_field = Some("InstanceName");
        info.extra_data = Some(primary_interface);
        info
    }

    async fn read_resources(&self, condition: Params) -> Result<Vec<Value>> {
        let info = Service::Ecs.action("DescribeInstances");
        NextTokenQuery::new("Instances")
            .max_results(100)
            .collect(&condition, |params| {
                let client = self.client.clone();
                let info = info.clone();
                async move { describe(&client, &info, &params, "instances").await }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primary_interface_is_flattened() {
        let item = json!({
            "InstanceId": "i-1",
            "NetworkInterfaces": [
                {"PrimaryIpAddress": "192.168.0.4", "SubnetId": "subnet-1"},
                {"PrimaryIpAddress": "192.168.1.4", "SubnetId": "subnet-2"}
            ]
        });
        let mut mapped = HashMap::new();
        primary_interface(&mut mapped, &item).unwrap();
        assert_eq!(mapped["primary_ip_address"].as_string(), Some("192.168.0.4"));
        assert_eq!(mapped["subnet_id"].as_string(), Some("subnet-1"));

        let mut empty = HashMap::new();
        primary_interface(&mut empty, &json!({"InstanceId": "i-2"})).unwrap();
        assert!(empty.is_empty());
    }
}
