pub mod data_source_acls;

pub use data_source_acls::AclsDataSource;
