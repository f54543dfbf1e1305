//! Object storage resources

pub mod resource_tos_bucket;

pub use resource_tos_bucket::TosBucketService;
