//! `volcengine_tos_buckets`: the bucket listing has no server-side filters,
//! so the exact-name match runs on the client

use async_trait::async_trait;
use serde_json::Value;
use tfdispatch::{
    CallExecutor, ConvertMode, DataSourceInfo, DataSourceService, DispatchError, FieldSpec,
    Params, ResourceData, ResourceDescriptor, Result,
};

use crate::api::universal::list_buckets;
use crate::api::Client;

const BUCKET_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("id").computed(),
    FieldSpec::string("name").computed(),
    FieldSpec::string("location").computed(),
    FieldSpec::string("creation_date").computed(),
    FieldSpec::string("extranet_endpoint").computed(),
    FieldSpec::string("intranet_endpoint").computed(),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("bucket_name").optional(),
    FieldSpec::string("name_regex").optional().ignore(),
    FieldSpec::number("total_count").computed(),
    FieldSpec::block("buckets", BUCKET_FIELDS).computed(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_tos_buckets", FIELDS)
        .with_description("Lists object storage buckets");

fn name_matches(data: &ResourceData, item: &Value) -> bool {
    match data.get_string("bucket_name").filter(|n| !n.is_empty()) {
        Some(wanted) => item.get("Name").and_then(Value::as_str) == Some(wanted),
        None => true,
    }
}

pub struct TosBucketsDataSource {
    client: Client,
}

impl TosBucketsDataSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceService for TosBucketsDataSource {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn datasource_info(&self) -> DataSourceInfo {
        let mut info = DataSourceInfo::new("Name", "buckets");
        info.convert_mode = ConvertMode::Ignore;
        info.name_field = Some("Name");
        info.client_filter = Some(name_matches);
        info
    }

    async fn read_resources(&self, _condition: Params) -> Result<Vec<Value>> {
        let info = list_buckets();
        let response = self
            .client
            .bypass(&info, None)
            .await
            .map_err(|e| DispatchError::call("ListBuckets", "buckets", e))?;
        Ok(response
            .body
            .get("Buckets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}
