//! Identity and access management resources

pub mod resource_iam_role;

pub use resource_iam_role::IamRoleService;
