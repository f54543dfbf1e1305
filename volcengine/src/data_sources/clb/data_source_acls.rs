//! `volcengine_acls`: access control lists, paged by page number

use async_trait::async_trait;
use serde_json::Value;
use tfdispatch::pagination::PageNumberQuery;
use tfdispatch::{
    AttributeType, DataSourceInfo, DataSourceService, FieldSpec, Params, RequestConvert,
    ResourceDescriptor, Result,
};

use crate::api::{Client, Service};
use crate::resources::describe;

const ACL_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("id").computed(),
    FieldSpec::string("acl_id").computed(),
    FieldSpec::string("acl_name").computed(),
    FieldSpec::string("description").computed(),
    FieldSpec::number("acl_entry_count").computed(),
    FieldSpec::list("listeners", AttributeType::String).computed(),
    FieldSpec::string("status").computed(),
    FieldSpec::string("project_name").computed(),
    FieldSpec::string("create_time").computed(),
    FieldSpec::string("update_time").computed(),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::set("ids", AttributeType::String).optional(),
    FieldSpec::string("acl_name").optional(),
    FieldSpec::string("project_name").optional(),
    FieldSpec::string("name_regex").optional().ignore(),
    FieldSpec::number("total_count").computed(),
    FieldSpec::block("acls", ACL_FIELDS).computed(),
];

pub static DESCRIPTOR: ResourceDescriptor = ResourceDescriptor::new("volcengine_acls", FIELDS)
    .with_description("Lists load balancer access control lists");

pub struct AclsDataSource {
    client: Client,
}

impl AclsDataSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSourceService for AclsDataSource {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn datasource_info(&self) -> DataSourceInfo {
        let mut info = DataSourceInfo::new("AclId", "acls");
        info.request_converts
            .insert("ids", RequestConvert::new().target("AclIds"));
        info.name_field = Some("AclName");
        info
    }

    async fn read_resources(&self, condition: Params) -> Result<Vec<Value>> {
        let info = Service::Clb.action("DescribeAcls");
        PageNumberQuery::new("Acls")
            .page_size(100)
            .collect(&condition, |params| {
                let client = self.client.clone();
                let info = info.clone();
                async move { describe(&client, &info, &params, "acls").await }
            })
            .await
    }
}
