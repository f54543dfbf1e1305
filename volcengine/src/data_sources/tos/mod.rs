pub mod data_source_tos_buckets;

pub use data_source_tos_buckets::TosBucketsDataSource;
