//! Tag reconciliation: untag removed pairs, then tag added ones

use crate::call::{SdkCall, UniversalInfo};
use crate::data::ResourceData;
use crate::request::ConvertMode;
use crate::types::Dynamic;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Reads a tag attribute: a set of `{key, value}` blocks or a plain map
pub fn tags_from(value: &Dynamic) -> BTreeSet<Tag> {
    match value {
        Dynamic::List(items) => items
            .iter()
            .filter_map(|item| {
                let entry = item.as_map()?;
                let key = entry.get("key")?.as_string()?;
                let value = entry
                    .get("value")
                    .and_then(Dynamic::as_string)
                    .unwrap_or_default();
                Some(Tag {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .collect(),
        Dynamic::Map(entries) => entries
            .iter()
            .filter_map(|(k, v)| {
                Some(Tag {
                    key: k.clone(),
                    value: v.as_string()?.to_string(),
                })
            })
            .collect(),
        _ => BTreeSet::new(),
    }
}

/// `(added, removed)`: pairs only in `new`, pairs only in `old`
pub fn set_difference(old: &BTreeSet<Tag>, new: &BTreeSet<Tag>) -> (Vec<Tag>, Vec<Tag>) {
    let added = new.difference(old).cloned().collect();
    let removed = old.difference(new).cloned().collect();
    (added, removed)
}

/// Tag/untag actions of one service
#[derive(Debug, Clone)]
pub struct TagApi {
    /// Tag attribute in the resource schema
    pub field: &'static str,
    pub tag: UniversalInfo,
    pub untag: UniversalInfo,
    pub resource_type: Option<&'static str>,
}

/// Calls reconciling the tag attribute of `data`. Unchanged tags yield none.
pub fn update_tag_calls(data: &ResourceData, api: &TagApi) -> Vec<SdkCall> {
    if !data.has_change(api.field) {
        return Vec::new();
    }
    let (old, new) = data.get_change(api.field);
    let (added, removed) = set_difference(&tags_from(&old), &tags_from(&new));

    let mut calls = Vec::new();
    // keys whose value changed are removed first and re-added below
    let removed_keys: BTreeSet<String> = removed.into_iter().map(|t| t.key).collect();
    if !removed_keys.is_empty() {
        let resource_type = api.resource_type;
        calls.push(
            SdkCall::universal(api.untag.clone())
                .convert_mode(ConvertMode::Ignore)
                .before_call(move |d, params| {
                    params.insert("ResourceIds.1".to_string(), Value::from(d.id()));
                    if let Some(t) = resource_type {
                        params.insert("ResourceType".to_string(), Value::from(t));
                    }
                    for (i, key) in removed_keys.iter().enumerate() {
                        params.insert(format!("TagKeys.{}", i + 1), Value::from(key.as_str()));
                    }
                    Ok(true)
                }),
        );
    }

    if !added.is_empty() {
        let resource_type = api.resource_type;
        calls.push(
            SdkCall::universal(api.tag.clone())
                .convert_mode(ConvertMode::Ignore)
                .before_call(move |d, params| {
                    params.insert("ResourceIds.1".to_string(), Value::from(d.id()));
                    if let Some(t) = resource_type {
                        params.insert("ResourceType".to_string(), Value::from(t));
                    }
                    for (i, tag) in added.iter().enumerate() {
                        params.insert(format!("Tags.{}.Key", i + 1), Value::from(tag.key.as_str()));
                        params.insert(
                            format!("Tags.{}.Value", i + 1),
                            Value::from(tag.value.as_str()),
                        );
                    }
                    Ok(true)
                }),
        );
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CallTarget, ContentType, HttpMethod};
    use crate::request::Params;
    use std::collections::HashMap;

    fn tag(key: &str, value: &str) -> Dynamic {
        let mut entry = HashMap::new();
        entry.insert("key".to_string(), Dynamic::string(key));
        entry.insert("value".to_string(), Dynamic::string(value));
        Dynamic::Map(entry)
    }

    fn info(action: &str) -> UniversalInfo {
        UniversalInfo {
            service_name: "vpc".to_string(),
            version: "2020-04-01".to_string(),
            action: action.to_string(),
            http_method: HttpMethod::Get,
            content_type: ContentType::Default,
        }
    }

    fn api() -> TagApi {
        TagApi {
            field: "tags",
            tag: info("TagResources"),
            untag: info("UntagResources"),
            resource_type: Some("networkacl"),
        }
    }

    fn data(old: Vec<Dynamic>, new: Vec<Dynamic>) -> ResourceData {
        let mut prior = HashMap::new();
        prior.insert("tags".to_string(), Dynamic::List(old));
        let mut planned = HashMap::new();
        planned.insert("tags".to_string(), Dynamic::List(new));
        ResourceData::for_update("acl-1", prior, planned)
    }

    fn run_before(call: &SdkCall, data: &ResourceData) -> Params {
        let mut params = Params::new();
        let hook = call.before_call.as_ref().unwrap();
        assert!(hook(data, &mut params).unwrap());
        params
    }

    fn action(call: &SdkCall) -> &str {
        match &call.target {
            CallTarget::Universal(info) => &info.action,
            CallTarget::Bypass(_) => panic!("unexpected bypass"),
        }
    }

    #[test]
    fn unchanged_tags_produce_no_calls() {
        let d = data(vec![tag("k1", "v1")], vec![tag("k1", "v1")]);
        assert!(update_tag_calls(&d, &api()).is_empty());
    }

    #[test]
    fn untag_runs_before_tag() {
        let d = data(
            vec![tag("k1", "v1"), tag("k2", "v2")],
            vec![tag("k2", "v2-new"), tag("k3", "v3")],
        );
        let calls = update_tag_calls(&d, &api());
        assert_eq!(calls.len(), 2);
        assert_eq!(action(&calls[0]), "UntagResources");
        assert_eq!(action(&calls[1]), "TagResources");

        let untag = run_before(&calls[0], &d);
        assert_eq!(untag["ResourceIds.1"], "acl-1");
        assert_eq!(untag["ResourceType"], "networkacl");
        assert_eq!(untag["TagKeys.1"], "k1");
        assert_eq!(untag["TagKeys.2"], "k2");

        let add = run_before(&calls[1], &d);
        assert_eq!(add["Tags.1.Key"], "k2");
        assert_eq!(add["Tags.1.Value"], "v2-new");
        assert_eq!(add["Tags.2.Key"], "k3");
    }

    #[test]
    fn only_additions_skip_untag() {
        let d = data(vec![], vec![tag("k1", "v1")]);
        let calls = update_tag_calls(&d, &api());
        assert_eq!(calls.len(), 1);
        assert_eq!(action(&calls[0]), "TagResources");
    }

    #[test]
    fn tags_from_map() {
        let mut map = HashMap::new();
        map.insert("env".to_string(), Dynamic::string("prod"));
        let tags = tags_from(&Dynamic::Map(map));
        assert!(tags.contains(&Tag {
            key: "env".to_string(),
            value: "prod".to_string()
        }));
    }
}
