//! Load balancer resources

pub mod resource_acl;

pub use resource_acl::AclService;
