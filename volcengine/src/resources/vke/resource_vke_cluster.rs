//! Kubernetes cluster. The service speaks JSON bodies, so nested blocks are
//! sent as objects rather than `Field.N` keys.

use async_trait::async_trait;
use serde_json::{json, Value};
use tfdispatch::{
    AttributeType, ConvertMode, DispatchError, FieldSpec, OnError, RequestConvert,
    RequestConverts, ResourceData, ResourceDescriptor, ResourceService, Result, SdkCall,
    StateRefresh,
};

use crate::api::{Client, Service};
use crate::resources::{describe, first_item};

const CLUSTER_CONFIG_FIELDS: &[FieldSpec] = &[
    FieldSpec::list("subnet_ids", AttributeType::String)
        .required()
        .force_new(),
    FieldSpec::bool("api_server_public_access_enabled").optional(),
    FieldSpec::bool("resource_public_access_default_enabled").optional(),
];

const PODS_CONFIG_FIELDS: &[FieldSpec] = &[FieldSpec::string("pod_network_mode")
    .required()
    .force_new()
    .description("Flannel or VpcCniShared")];

const SERVICES_CONFIG_FIELDS: &[FieldSpec] =
    &[FieldSpec::list("service_cidrsv4", AttributeType::String).required()];

const STATUS_FIELDS: &[FieldSpec] = &[FieldSpec::string("phase").computed()];

const TAG_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("key").required(),
    FieldSpec::string("value").required(),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("name").required(),
    FieldSpec::string("description").optional(),
    FieldSpec::bool("delete_protection_enabled").optional(),
    FieldSpec::string("kubernetes_version")
        .optional()
        .computed()
        .force_new(),
    FieldSpec::single_block("cluster_config", CLUSTER_CONFIG_FIELDS).required(),
    FieldSpec::single_block("pods_config", PODS_CONFIG_FIELDS)
        .required()
        .force_new(),
    FieldSpec::single_block("services_config", SERVICES_CONFIG_FIELDS)
        .required()
        .force_new(),
    FieldSpec::set_block("tags", TAG_FIELDS).optional().force_new(),
    FieldSpec::single_block("status", STATUS_FIELDS).computed(),
    FieldSpec::string("create_time").computed(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_vke_cluster", FIELDS)
        .with_description("Manages a VKE Kubernetes cluster");

fn running() -> StateRefresh {
    StateRefresh::new(&["Running"]).fail_states(&["Failed"])
}

fn phase_of(cluster: &Value) -> Option<String> {
    cluster
        .get("Status")
        .and_then(|s| s.get("Phase"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub struct VkeClusterService {
    client: Client,
}

impl VkeClusterService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceService for VkeClusterService {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    async fn read_resource(&self, _data: &ResourceData, id: &str) -> Result<Value> {
        let info = Service::Vke.action("ListClusters");
        let mut params = tfdispatch::Params::new();
        params.insert("Filter".to_string(), json!({"Ids": [id]}));
        let response = describe(&self.client, &info, &params, id).await?;
        first_item(&response, "Items", id)
    }

    async fn resource_status(&self, data: &ResourceData, id: &str) -> Result<Option<String>> {
        match self.read_resource(data, id).await {
            Ok(cluster) => Ok(phase_of(&cluster)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_resource(&self, _data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(vec![SdkCall::universal(Service::Vke.action("CreateCluster"))
            .before_call(|_, params| {
                // makes a retried create idempotent on the service side
                params.insert(
                    "ClientToken".to_string(),
                    Value::from(uuid::Uuid::new_v4().to_string()),
                );
                Ok(true)
            })
            .after_call(|d, response| {
                let id = response
                    .get("Id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| DispatchError::Convert("CreateCluster returned no Id".into()))?;
                d.set_id(id);
                Ok(())
            })
            .refresh(running())])
    }

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let fields = [
            "name",
            "description",
            "delete_protection_enabled",
            "cluster_config",
        ];
        if !data.has_changes(&fields) {
            return Ok(Vec::new());
        }
        let mut converts = RequestConverts::new();
        for field in fields {
            converts.insert(field, RequestConvert::new());
        }
        converts.insert(
            "cluster_config",
            RequestConvert::new().next_level("subnet_ids", RequestConvert::ignored()),
        );
        Ok(vec![SdkCall::universal(Service::Vke.action("UpdateClusterConfig"))
            .convert_mode(ConvertMode::InConvert)
            .converts(converts)
            .request_id_field("Id")
            .refresh(running())])
    }

    fn remove_resource(&self, _data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(vec![SdkCall::universal(Service::Vke.action("DeleteCluster"))
            .convert_mode(ConvertMode::Ignore)
            .request_id_field("Id")
            .on_error(OnError::delete_retry())
            .refresh(StateRefresh::gone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use std::collections::HashMap;
    use tfdispatch::{ContentType, Dynamic, RequestBuilder, ResponseConverts, ResponseMapper};

    fn block(pairs: &[(&str, Dynamic)]) -> Dynamic {
        let map: HashMap<String, Dynamic> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Dynamic::List(vec![Dynamic::Map(map)])
    }

    fn config() -> HashMap<String, Dynamic> {
        let mut config = HashMap::new();
        config.insert("name".to_string(), Dynamic::string("k8s"));
        config.insert(
            "cluster_config".to_string(),
            block(&[
                ("subnet_ids", Dynamic::from(vec!["subnet-1"])),
                ("api_server_public_access_enabled", Dynamic::Bool(true)),
            ]),
        );
        config.insert(
            "pods_config".to_string(),
            block(&[("pod_network_mode", Dynamic::string("VpcCniShared"))]),
        );
        config.insert(
            "services_config".to_string(),
            block(&[("service_cidrsv4", Dynamic::from(vec!["172.30.0.0/18"]))]),
        );
        config
    }

    fn service() -> VkeClusterService {
        VkeClusterService::new(create_test_client("http://127.0.0.1:1"))
    }

    #[test]
    fn create_body_nests_blocks() {
        let data = ResourceData::from_config(config());
        let calls = service().create_resource(&data).unwrap();
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            calls[0].convert_mode,
            &calls[0].converts,
            ContentType::ApplicationJson,
        )
        .build(&data)
        .unwrap();
        assert_eq!(
            params["ClusterConfig"],
            json!({"SubnetIds": ["subnet-1"], "ApiServerPublicAccessEnabled": true})
        );
        assert_eq!(params["PodsConfig"]["PodNetworkMode"], "VpcCniShared");
        assert_eq!(params["ServicesConfig"]["ServiceCidrsv4"], json!(["172.30.0.0/18"]));
        assert!(!params.contains_key("Status"));
    }

    #[test]
    fn client_token_is_fresh_per_call() {
        let data = ResourceData::from_config(config());
        let calls = service().create_resource(&data).unwrap();
        let hook = calls[0].before_call.as_ref().unwrap();
        let mut first = tfdispatch::Params::new();
        let mut second = tfdispatch::Params::new();
        hook(&data, &mut first).unwrap();
        hook(&data, &mut second).unwrap();
        assert_ne!(first["ClientToken"], second["ClientToken"]);
    }

    #[test]
    fn status_phase_is_read_from_nested_object() {
        let cluster = json!({"Id": "cc-1", "Status": {"Phase": "Running", "Conditions": [{"Type": "Ok"}]}});
        assert_eq!(phase_of(&cluster).as_deref(), Some("Running"));

        let mut data = ResourceData::default();
        ResponseMapper::new(&ResponseConverts::new()).write(&DESCRIPTOR, &cluster, &mut data);
        let status = data.get_list("status");
        assert_eq!(
            status[0].as_map().unwrap().get("phase").unwrap().as_string(),
            Some("Running")
        );
    }

    #[test]
    fn update_leaves_subnets_out() {
        let prior = config();
        let mut planned = prior.clone();
        planned.insert(
            "cluster_config".to_string(),
            block(&[
                ("subnet_ids", Dynamic::from(vec!["subnet-1"])),
                ("api_server_public_access_enabled", Dynamic::Bool(true)),
                ("resource_public_access_default_enabled", Dynamic::Bool(true)),
            ]),
        );
        let data = ResourceData::for_update("cc-1", prior, planned);
        let calls = service().modify_resource(&data).unwrap();
        assert_eq!(calls.len(), 1);

        let params = RequestBuilder::new(
            &DESCRIPTOR,
            calls[0].convert_mode,
            &calls[0].converts,
            ContentType::ApplicationJson,
        )
        .build(&data)
        .unwrap();
        assert!(params["ClusterConfig"].get("SubnetIds").is_none());
        assert_eq!(params["ClusterConfig"]["ResourcePublicAccessDefaultEnabled"], true);
        assert!(!params.contains_key("Name"));
    }
    #[test]
    fn update_can_disable_nested_flag() {
        let prior = config();
        let mut planned = prior.clone();
        planned.insert(
            "cluster_config".to_string(),
            block(&[
                ("subnet_ids", Dynamic::from(vec!["subnet-1"])),
                ("api_server_public_access_enabled", Dynamic::Bool(false)),
            ]),
        );
        let data = ResourceData::for_update("cc-1", prior, planned).with_descriptor(&DESCRIPTOR);
        let calls = service().modify_resource(&data).unwrap();
        assert_eq!(calls.len(), 1);

        let params = RequestBuilder::new(
            &DESCRIPTOR,
            calls[0].convert_mode,
            &calls[0].converts,
            ContentType::ApplicationJson,
        )
        .build(&data)
        .unwrap();
        assert_eq!(
            params["ClusterConfig"],
            json!({"ApiServerPublicAccessEnabled": false})
        );
        assert_eq!(params.len(), 1);
    }
}
