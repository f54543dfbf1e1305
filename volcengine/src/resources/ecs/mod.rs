//! Compute resources

pub mod resource_ecs_instance_state;

pub use resource_ecs_instance_state::EcsInstanceStateService;
