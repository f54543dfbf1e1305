//! Object storage bucket. Buckets are addressed directly over HTTP instead of
//! through named actions, so every call here is a bypass call.

use async_trait::async_trait;
use serde_json::{json, Value};
use tfdispatch::{
    BypassInfo, CallExecutor, DispatchError, FieldSpec, HttpMethod, OnError, ResourceData,
    ResourceDescriptor, ResourceService, Result, SdkCall, StateRefresh,
};
use tfdispatch::validator::{AttributeValidators, StringInValidator};

use crate::api::universal::bucket;
use crate::api::Client;

pub const ACL_HEADER: &str = "x-tos-acl";
pub const STORAGE_CLASS_HEADER: &str = "x-tos-storage-class";
const REGION_HEADER: &str = "x-tos-bucket-region";

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("bucket_name").required().force_new(),
    FieldSpec::string("public_acl")
        .optional()
        .computed()
        .description("private, public-read, public-read-write or authenticated-read"),
    FieldSpec::string("storage_class")
        .optional()
        .computed()
        .force_new(),
    FieldSpec::string("location").computed(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_tos_bucket", FIELDS)
        .with_description("Manages an object storage bucket");

const ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
];

/// Canned ACL equivalent of a grant list
fn canned_acl(grants: &[Value]) -> &'static str {
    let granted = |group: &str, permission: &str| {
        grants.iter().any(|g| {
            g.pointer("/Grantee/Canned").and_then(Value::as_str) == Some(group)
                && matches!(
                    g.get("Permission").and_then(Value::as_str),
                    Some(p) if p == permission || p == "FULL_CONTROL"
                )
        })
    };
    if granted("AllUsers", "READ") && granted("AllUsers", "WRITE") {
        "public-read-write"
    } else if granted("AllUsers", "READ") {
        "public-read"
    } else if granted("AuthenticatedUsers", "READ") {
        "authenticated-read"
    } else {
        "private"
    }
}

pub struct TosBucketService {
    client: Client,
}

impl TosBucketService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, info: &BypassInfo, id: &str) -> Result<tfdispatch::BypassResponse> {
        self.client
            .bypass(info, None)
            .await
            .map_err(|e| DispatchError::call(info.describe(), id, e))
    }
}

#[async_trait]
impl ResourceService for TosBucketService {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    async fn read_resource(&self, _data: &ResourceData, id: &str) -> Result<Value> {
        let head = self.send(&bucket(HttpMethod::Head, id), id).await?;
        let acl = self
            .send(&bucket(HttpMethod::Get, id).url_param("acl", ""), id)
            .await?;
        let grants = acl
            .body
            .get("Grants")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(json!({
            "BucketName": id,
            "Location": head.headers.get(REGION_HEADER),
            "StorageClass": head.headers.get(STORAGE_CLASS_HEADER),
            "PublicAcl": canned_acl(grants),
        }))
    }

    async fn resource_status(&self, data: &ResourceData, id: &str) -> Result<Option<String>> {
        match self.read_resource(data, id).await {
            Ok(_) => Ok(Some("Available".to_string())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn validators(&self) -> AttributeValidators {
        AttributeValidators::new().rule(
            "public_acl",
            StringInValidator {
                allowed: ACLS,
                ignore_case: false,
            },
        )
    }

    fn create_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let name = data.require_string("bucket_name")?.to_string();
        let mut info = bucket(HttpMethod::Put, &name);
        if let Some(acl) = data.get_string("public_acl").filter(|s| !s.is_empty()) {
            info = info.header(ACL_HEADER, acl);
        }
        if let Some(class) = data.get_string("storage_class").filter(|s| !s.is_empty()) {
            info = info.header(STORAGE_CLASS_HEADER, class);
        }
        Ok(vec![SdkCall::bypass(info)
            .after_call(move |d, _| {
                d.set_id(name.clone());
                Ok(())
            })
            .refresh(StateRefresh::new(&["Available"]))])
    }

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        if !data.has_change("public_acl") {
            return Ok(Vec::new());
        }
        let acl = data.get_string("public_acl").unwrap_or("private");
        Ok(vec![SdkCall::bypass(
            bucket(HttpMethod::Put, data.id())
                .url_param("acl", "")
                .header(ACL_HEADER, acl),
        )])
    }

    fn remove_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(vec![SdkCall::bypass(bucket(HttpMethod::Delete, data.id()))
            .on_error(OnError::delete_retry())
            .refresh(StateRefresh::gone())])
    }
}
