//! Security group rule
//!
//! Rules have no id of their own. The resource id joins the identifying
//! attributes: `sg-id:direction:protocol:port_start:port_end:cidr_or_source_group`.
//! Every field except the description forces a new rule.

use async_trait::async_trait;
use serde_json::Value;
use tfdispatch::validator::{AttributeValidators, StringInValidator};
use tfdispatch::{
    parse_composite_id, DispatchError, FieldSpec, OnError, RequestConvert,
    RequestConverts, ResourceData, ResourceDescriptor, ResourceService, Result, SdkCall,
};

use crate::api::{Client, Service};
use crate::resources::{describe, id_params};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("security_group_id").required().force_new(),
    FieldSpec::string("direction")
        .required()
        .force_new()
        .description("ingress or egress"),
    FieldSpec::string("protocol")
        .required()
        .force_new()
        .description("tcp, udp, icmp or all"),
    FieldSpec::number("port_start").required().force_new(),
    FieldSpec::number("port_end").required().force_new(),
    FieldSpec::string("cidr_ip").optional().force_new(),
    FieldSpec::string("source_group_id").optional().force_new(),
    FieldSpec::string("policy").optional().computed().force_new(),
    FieldSpec::number("priority").optional().computed().force_new(),
    FieldSpec::string("description").optional(),
];

pub static DESCRIPTOR: ResourceDescriptor =
    ResourceDescriptor::new("volcengine_security_group_rule", FIELDS)
        .with_description("Manages one ingress or egress rule of a security group");

/// Identifying attributes of a rule
#[derive(Debug, Clone, PartialEq)]
struct RuleKey {
    security_group_id: String,
    direction: String,
    protocol: String,
    port_start: i64,
    port_end: i64,
    /// CIDR block, or the source security group when no CIDR is set
    peer: String,
}

impl RuleKey {
    fn from_data(data: &ResourceData) -> Result<Self> {
        let peer = data
            .get_string("cidr_ip")
            .filter(|s| !s.is_empty())
            .or_else(|| data.get_string("source_group_id"))
            .unwrap_or_default();
        Ok(Self {
            security_group_id: data.require_string("security_group_id")?.to_string(),
            direction: data.require_string("direction")?.to_string(),
            protocol: data.require_string("protocol")?.to_string(),
            port_start: data.get_number("port_start").unwrap_or(-1.0) as i64,
            port_end: data.get_number("port_end").unwrap_or(-1.0) as i64,
            peer: peer.to_string(),
        })
    }

    fn parse(id: &str) -> Result<Self> {
        let parts = parse_composite_id(id, 6)?;
        let port = |s: &str| {
            s.parse::<i64>()
                .map_err(|_| DispatchError::Validation(format!("invalid port {:?} in id {}", s, id)))
        };
        Ok(Self {
            security_group_id: parts[0].clone(),
            direction: parts[1].clone(),
            protocol: parts[2].clone(),
            port_start: port(&parts[3])?,
            port_end: port(&parts[4])?,
            peer: parts[5].clone(),
        })
    }

    fn id(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.security_group_id,
            self.direction,
            self.protocol,
            self.port_start,
            self.port_end,
            self.peer
        )
    }

    fn matches(&self, permission: &Value) -> bool {
        let text = |key: &str| permission.get(key).and_then(Value::as_str).unwrap_or_default();
        let number = |key: &str| permission.get(key).and_then(Value::as_i64).unwrap_or(-1);
        text("Direction") == self.direction
            && text("Protocol") == self.protocol
            && number("PortStart") == self.port_start
            && number("PortEnd") == self.port_end
            && (text("CidrIp") == self.peer || text("SourceGroupId") == self.peer)
    }
}

/// Port ranges: 1-65535 for tcp/udp, -1/-1 for icmp and all
fn check_ports(protocol: &str, start: i64, end: i64) -> Result<()> {
    let valid = match protocol {
        "tcp" | "udp" => (1..=65535).contains(&start) && (1..=65535).contains(&end) && start <= end,
        "icmp" | "all" => start == -1 && end == -1,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DispatchError::Validation(format!(
            "port range {}/{} is not valid for protocol {}",
            start, end, protocol
        )))
    }
}

/// `AuthorizeSecurityGroup` + `ingress` -> `AuthorizeSecurityGroupIngress`
fn action(direction: &str, base: &str) -> Result<String> {
    match direction {
        "ingress" => Ok(format!("{}Ingress", base)),
        "egress" => Ok(format!("{}Egress", base)),
        other => Err(DispatchError::Validation(format!(
            "direction must be ingress or egress, got {}",
            other
        ))),
    }
}

fn rule_converts() -> RequestConverts {
    let mut converts = RequestConverts::new();
    converts.insert("direction", RequestConvert::ignored());
    converts.insert("port_start", RequestConvert::new().force_get());
    converts.insert("port_end", RequestConvert::new().force_get());
    converts
}

/// Modify and revoke address an existing rule by all of its identifying fields
fn identity_converts() -> RequestConverts {
    let mut converts = rule_converts();
    for field in [
        "security_group_id",
        "protocol",
        "cidr_ip",
        "source_group_id",
        "policy",
        "priority",
    ] {
        converts.insert(field, RequestConvert::new().force_get());
    }
    converts
}

pub struct SecurityGroupRuleService {
    client: Client,
}

impl SecurityGroupRuleService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceService for SecurityGroupRuleService {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    async fn read_resource(&self, _data: &ResourceData, id: &str) -> Result<Value> {
        let key = RuleKey::parse(id)?;
        let info = Service::Vpc.action("DescribeSecurityGroupAttributes");
        let params = id_params("SecurityGroupId", &key.security_group_id);
        let response = describe(&self.client, &info, &params, id).await?;

        let permission = response
            .get("Permissions")
            .and_then(Value::as_array)
            .and_then(|items| items.iter().find(|p| key.matches(p)).cloned())
            .ok_or_else(|| DispatchError::NotFound(id.to_string()))?;
        let mut object = match permission {
            Value::Object(object) => object,
            _ => return Err(DispatchError::NotFound(id.to_string())),
        };
        object.insert(
            "SecurityGroupId".to_string(),
            Value::from(key.security_group_id),
        );
        Ok(Value::Object(object))
    }

    /// Rules are usable as soon as the call returns
    async fn resource_status(&self, _data: &ResourceData, _id: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn validators(&self) -> AttributeValidators {
        AttributeValidators::new()
            .rule(
                "protocol",
                StringInValidator {
                    allowed: &["tcp", "udp", "icmp", "all"],
                    ignore_case: false,
                },
            )
            .rule(
                "direction",
                StringInValidator {
                    allowed: &["ingress", "egress"],
                    ignore_case: false,
                },
            )
            .rule(
                "policy",
                StringInValidator {
                    allowed: &["accept", "drop"],
                    ignore_case: false,
                },
            )
    }

    fn create_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let key = RuleKey::from_data(data)?;
        let authorize = action(&key.direction, "AuthorizeSecurityGroup")?;
        Ok(vec![SdkCall::universal(Service::Vpc.action(&authorize))
            .converts(rule_converts())
            .lock_key(key.security_group_id.clone())
            .before_call(|d, _| {
                let key = RuleKey::from_data(d)?;
                check_ports(&key.protocol, key.port_start, key.port_end)?;
                if key.peer.is_empty() {
                    return Err(DispatchError::Validation(
                        "one of cidr_ip or source_group_id is required".into(),
                    ));
                }
                Ok(true)
            })
            .after_call(move |d, _| {
                d.set_id(key.id());
                Ok(())
            })])
    }

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        if !data.has_change("description") {
            return Ok(Vec::new());
        }
        let key = RuleKey::from_data(data)?;
        let modify = action(&key.direction, "ModifySecurityGroupRuleDescriptions")?;
        let mut converts = identity_converts();
        converts.insert("description", RequestConvert::new().force_get());
        Ok(vec![SdkCall::universal(Service::Vpc.action(&modify))
            .converts(converts)
            .lock_key(key.security_group_id)])
    }

    fn remove_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>> {
        let key = match RuleKey::from_data(data) {
            Ok(key) => key,
            Err(_) => RuleKey::parse(data.id())?,
        };
        let revoke = action(&key.direction, "RevokeSecurityGroup")?;
        Ok(vec![SdkCall::universal(Service::Vpc.action(&revoke))
            .converts(identity_converts())
            .lock_key(key.security_group_id)
            .on_error(OnError::delete_retry())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use serde_json::json;
    use std::collections::HashMap;
    use tfdispatch::{CallTarget, ContentType, Dynamic, Params, RequestBuilder};

    fn config(protocol: &str, start: f64, end: f64) -> HashMap<String, Dynamic> {
        let mut config = HashMap::new();
        config.insert("security_group_id".to_string(), Dynamic::string("sg-1"));
        config.insert("direction".to_string(), Dynamic::string("ingress"));
        config.insert("protocol".to_string(), Dynamic::string(protocol));
        config.insert("port_start".to_string(), Dynamic::Number(start));
        config.insert("port_end".to_string(), Dynamic::Number(end));
        config.insert("cidr_ip".to_string(), Dynamic::string("10.0.0.0/8"));
        config
    }

    fn service() -> SecurityGroupRuleService {
        SecurityGroupRuleService::new(create_test_client("http://127.0.0.1:1"))
    }

    fn action_of(call: &SdkCall) -> &str {
        match &call.target {
            CallTarget::Universal(info) => &info.action,
            CallTarget::Bypass(_) => panic!("unexpected bypass"),
        }
    }

    #[test]
    fn id_round_trips_through_key() {
        let data = ResourceData::from_config(config("tcp", 22.0, 22.0));
        let key = RuleKey::from_data(&data).unwrap();
        assert_eq!(key.id(), "sg-1:ingress:tcp:22:22:10.0.0.0/8");
        assert_eq!(RuleKey::parse(&key.id()).unwrap(), key);
        assert!(RuleKey::parse("sg-1:ingress:tcp:x:22:10.0.0.0/8").is_err());
    }

    #[test]
    fn port_ranges_follow_protocol() {
        assert!(check_ports("tcp", 22, 22).is_ok());
        assert!(check_ports("udp", 1, 65535).is_ok());
        assert!(check_ports("tcp", 0, 22).is_err());
        assert!(check_ports("tcp", 80, 22).is_err());
        assert!(check_ports("icmp", -1, -1).is_ok());
        assert!(check_ports("all", 1, 65535).is_err());
    }

    #[test]
    fn invalid_ports_fail_before_the_call() {
        let data = ResourceData::from_config(config("icmp", 22.0, 22.0));
        let calls = service().create_resource(&data).unwrap();
        assert_eq!(action_of(&calls[0]), "AuthorizeSecurityGroupIngress");
        let hook = calls[0].before_call.as_ref().unwrap();
        assert!(matches!(
            hook(&data, &mut Params::new()),
            Err(DispatchError::Validation(_))
        ));
    }

    #[test]
    fn create_params_skip_direction() {
        let data = ResourceData::from_config(config("tcp", 22.0, 22.0));
        let calls = service().create_resource(&data).unwrap();
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            calls[0].convert_mode,
            &calls[0].converts,
            ContentType::Default,
        )
        .build(&data)
        .unwrap();
        assert_eq!(params["PortStart"], json!(22));
        assert_eq!(params["CidrIp"], "10.0.0.0/8");
        assert!(!params.contains_key("Direction"));
        assert_eq!(calls[0].lock_key.as_deref(), Some("sg-1"));
    }

    #[test]
    fn permission_matching() {
        let key = RuleKey::parse("sg-1:egress:all:-1:-1:sg-2").unwrap();
        assert!(key.matches(&json!({
            "Direction": "egress", "Protocol": "all", "PortStart": -1, "PortEnd": -1,
            "CidrIp": "", "SourceGroupId": "sg-2"
        })));
        assert!(!key.matches(&json!({
            "Direction": "ingress", "Protocol": "all", "PortStart": -1, "PortEnd": -1,
            "SourceGroupId": "sg-2"
        })));
    }

    #[test]
    fn delete_revokes_with_state_values() {
        let state =
            ResourceData::from_state("sg-1:ingress:tcp:22:22:10.0.0.0/8", config("tcp", 22.0, 22.0));
        let calls = service().remove_resource(&state).unwrap();
        assert_eq!(action_of(&calls[0]), "RevokeSecurityGroupIngress");
        let params = RequestBuilder::new(
            &DESCRIPTOR,
            calls[0].convert_mode,
            &calls[0].converts,
            ContentType::Default,
        )
        .build(&state)
        .unwrap();
        assert_eq!(params["SecurityGroupId"], "sg-1");
        assert_eq!(params["Protocol"], "tcp");
        assert_eq!(params["PortEnd"], json!(22));
    }
}
