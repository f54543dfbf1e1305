//! Load balancer access control list with its CIDR entries

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use tfdispatch::{
    ConvertMode, DispatchError, Dynamic, FieldSpec, OnError, RequestConvert, RequestConverts,
    ResourceData, ResourceDescriptor, ResourceService, Result, SdkCall, StateRefresh,
};

use crate::api::{Client, Service};
use crate::resources::{describe, id_params};

const ENTRY_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("entry")
        .required()
        .description("CIDR block of the entry"),
    FieldSpec::string("description").optional(),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("acl_name")
        .optional()
        .description("Name of the ACL"),
    FieldSpec::string("description").optional(),
    FieldSpec::string("project_name").optional().computed(),
    FieldSpec::set_block("acl_entries", ENTRY_FIELDS).optional(),
    FieldSpec::string("status").computed(),
    FieldSpec::string("create_time").computed(),
];

pub static DESCRIPTOR: ResourceDescriptor = ResourceDescriptor::new("volcengine_acl", FIELDS)
    .with_description("Manages a CLB access control list");

/// Every entry change waits for the ACL to settle back to `Active`
fn active() -> StateRefresh {
    StateRefresh::new(&["Active"])
}

type Entry = (String, String);

fn entries_of(value: &Dynamic) -> BTreeSet<Entry> {
    value
        .as_list()
        .unwrap_or(&[])
        .iter()
        .filter_map(|item| {
            let map = item.as_map()?;
            let cidr = map.get("entry")?.as_string()?.to_string();
            let description = map
                .get("description")
                .and_then(Dynamic::as_string)
                .unwrap_or_default()
                .to_string();
            Some((cidr, description))
        })
        .collect()
}

fn add_entries_call(entries: Vec<Entry>) -> SdkCall {
    SdkCall::universal(Service::Clb.action("AddAclEntries"))
        .convert_mode(ConvertMode::Ignore)
        .request_id_field("AclId")
        .before_call(move |_, params| {
            for (i, (cidr, description)) in entries.iter().enumerate() {
                params.insert(format!("AclEntries.{}.Entry", i + 1), Value::from(cidr.as_str()));
                if !description.is_empty() {
                    params.insert(
                        format!("AclEntries.{}.Description", i + 1),
                        Value::from(description.as_str()),
                    );
                }
            }
            Ok(!entries.is_empty())
        })
        .refresh(active())
}

fn remove_entries_call(cidrs: Vec<String>) -> SdkCall {
    SdkCall::universal(Service::Clb.action("RemoveAclEntries"))
        .convert_mode(ConvertMode::Ignore)
        .request_id_field("AclId")
        .before_call(move |_, params| {
            for (i, cidr) in cidrs.iter().enumerate() {
                params.insert(format!("Entries.{}", i + 1), Value::from(cidr.as_str()));
            }
            Ok(!cidrs.is_empty())
        })
        .refresh(active())
}

pub struct AclService {
    client: Client,
}

impl AclService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceService for AclService {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    async fn read_resource(&self, _data: &ResourceData, id: &str) -> Result<Value> {
        let info = Service::Clb.action("DescribeAclAttributes");
        let response = describe(&self.client, &info, &id_params("AclId", id), id).await?;
        if response.get("AclId").is_none() {
            return Err(DispatchError::NotFound(id.to_string()));
        }
        Ok(response)
    }

    fn create_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let mut converts = RequestConverts::new();
        converts.insert("acl_entries", RequestConvert::ignored());

        let create = SdkCall::universal(Service::Clb.action("CreateAcl"))
            .converts(converts)
            .after_call(|d, response| {
                let id = response
                    .get("AclId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| DispatchError::Convert("CreateAcl returned no AclId".into()))?;
                d.set_id(id);
                Ok(())
            })
            .refresh(active());

        let entries = entries_of(&data.get_change("acl_entries").1);
        Ok(vec![create, add_entries_call(entries.into_iter().collect())])
    }

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let mut calls = Vec::new();
        if data.has_changes(&["acl_name", "description"]) {
            let mut converts = RequestConverts::new();
            converts.insert("acl_name", RequestConvert::new());
            converts.insert("description", RequestConvert::new());
            calls.push(
                SdkCall::universal(Service::Clb.action("ModifyAclAttributes"))
                    .convert_mode(ConvertMode::InConvert)
                    .converts(converts)
                    .request_id_field("AclId")
                    .refresh(active()),
            );
        }

        if data.has_change("acl_entries") {
            let (old, new) = data.get_change("acl_entries");
            let (old, new) = (entries_of(&old), entries_of(&new));
            // a changed description means remove and re-add the CIDR
            let removed: Vec<String> = old.difference(&new).map(|(cidr, _)| cidr.clone()).collect();
            let added: Vec<Entry> = new.difference(&old).cloned().collect();
            if !removed.is_empty() {
                calls.push(remove_entries_call(removed));
            }
            if !added.is_empty() {
                calls.push(add_entries_call(added));
            }
        }
        Ok(calls)
    }

    fn remove_resource(&self, _data: &ResourceData) -> Result<Vec<SdkCall>> {
        Ok(vec![SdkCall::universal(Service::Clb.action("DeleteAcl"))
            .convert_mode(ConvertMode::Ignore)
            .request_id_field("AclId")
            .on_error(OnError::delete_retry())
            .refresh(StateRefresh::gone())])
    }
}
