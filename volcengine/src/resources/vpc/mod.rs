//! VPC resources

pub mod resource_security_group_rule;

pub use resource_security_group_rule::SecurityGroupRuleService;
