//! Data source implementations

pub mod clb;
pub mod ecs;
pub mod tos;

pub use clb::AclsDataSource;
pub use ecs::EcsInstancesDataSource;
pub use tos::TosBucketsDataSource;
