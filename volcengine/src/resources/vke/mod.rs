//! Kubernetes engine resources

pub mod resource_vke_cluster;

pub use resource_vke_cluster::VkeClusterService;
