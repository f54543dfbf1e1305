pub mod data_source_ecs_instances;

pub use data_source_ecs_instances::EcsInstancesDataSource;
