//! Volcengine provider built on the tfdispatch engine

pub mod api;
pub mod config;
pub mod data_sources;
pub mod logging;
pub mod provider_data;
pub mod resources;

pub use config::{ConfigError, ProviderConfig};
pub use provider_data::VolcengineProviderData;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tfdispatch::{
    DataSource, DataSourceService, DispatchError, Diagnostics, Dynamic, Resource,
    ResourceDescriptor, ResourceService, Result,
};
use tracing::info;

static RESOURCE_DESCRIPTORS: &[&ResourceDescriptor] = &[
    &resources::clb::resource_acl::DESCRIPTOR,
    &resources::nat::resource_nat_gateway::DESCRIPTOR,
    &resources::iam::resource_iam_role::DESCRIPTOR,
    &resources::ecs::resource_ecs_instance_state::DESCRIPTOR,
    &resources::vpc::resource_security_group_rule::DESCRIPTOR,
    &resources::vke::resource_vke_cluster::DESCRIPTOR,
    &resources::tos::resource_tos_bucket::DESCRIPTOR,
];

static DATA_SOURCE_DESCRIPTORS: &[&ResourceDescriptor] = &[
    &data_sources::clb::data_source_acls::DESCRIPTOR,
    &data_sources::ecs::data_source_ecs_instances::DESCRIPTOR,
    &data_sources::tos::data_source_tos_buckets::DESCRIPTOR,
];

#[derive(Default)]
pub struct VolcengineProvider {
    provider_data: Option<VolcengineProviderData>,
}

impl VolcengineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.provider_data.is_some()
    }

    /// Reads the provider block and builds the shared client
    pub fn configure(&mut self, values: &HashMap<String, Dynamic>) -> Diagnostics {
        logging::init(logging::LogLevel::from_env());

        let mut diags = Diagnostics::new();
        let config = match ProviderConfig::resolve(values) {
            Ok(config) => config,
            Err(errors) => {
                for error in errors {
                    diags.add_error(error.to_string(), None::<String>);
                }
                return diags;
            }
        };

        match api::Client::new(
            &config.endpoint,
            &config.region,
            config.credentials,
            config.disable_ssl,
        ) {
            Ok(client) => {
                info!(region = %config.region, endpoint = %client.base_url(), "Provider configured");
                self.provider_data = Some(VolcengineProviderData::new(client));
            }
            Err(e) => {
                diags.add_error(format!("Failed to create API client: {}", e), None::<String>);
            }
        }
        diags
    }

    fn data(&self) -> Result<&VolcengineProviderData> {
        self.provider_data
            .as_ref()
            .ok_or(DispatchError::ProviderNotConfigured)
    }

    pub fn resource(&self, name: &str) -> Result<Resource> {
        let data = self.data()?;
        let client = data.client.clone();
        let service: Arc<dyn ResourceService> = match name {
            "volcengine_acl" => Arc::new(resources::AclService::new(client)),
            "volcengine_nat_gateway" => Arc::new(resources::NatGatewayService::new(client)),
            "volcengine_iam_role" => Arc::new(resources::IamRoleService::new(client)),
            "volcengine_ecs_instance_state" => {
                Arc::new(resources::EcsInstanceStateService::new(client))
            }
            "volcengine_security_group_rule" => {
                Arc::new(resources::SecurityGroupRuleService::new(client))
            }
            "volcengine_vke_cluster" => Arc::new(resources::VkeClusterService::new(client)),
            "volcengine_tos_bucket" => Arc::new(resources::TosBucketService::new(client)),
            _ => return Err(DispatchError::ResourceTypeNotFound(name.to_string())),
        };
        Ok(Resource::new(service, data.dispatcher.clone()))
    }

    pub fn data_source(&self, name: &str) -> Result<DataSource> {
        let data = self.data()?;
        let client = data.client.clone();
        let service: Arc<dyn DataSourceService> = match name {
            "volcengine_acls" => Arc::new(data_sources::AclsDataSource::new(client)),
            "volcengine_ecs_instances" => Arc::new(data_sources::EcsInstancesDataSource::new(client)),
            "volcengine_tos_buckets" => Arc::new(data_sources::TosBucketsDataSource::new(client)),
            _ => return Err(DispatchError::DataSourceTypeNotFound(name.to_string())),
        };
        Ok(DataSource::new(service, data.dispatcher.clone()))
    }

    pub fn resource_schemas() -> &'static HashMap<&'static str, &'static ResourceDescriptor> {
        static SCHEMAS: OnceLock<HashMap<&'static str, &'static ResourceDescriptor>> =
            OnceLock::new();
        SCHEMAS.get_or_init(|| RESOURCE_DESCRIPTORS.iter().map(|d| (d.name, *d)).collect())
    }

    pub fn data_source_schemas() -> &'static HashMap<&'static str, &'static ResourceDescriptor> {
        static SCHEMAS: OnceLock<HashMap<&'static str, &'static ResourceDescriptor>> =
            OnceLock::new();
        SCHEMAS.get_or_init(|| DATA_SOURCE_DESCRIPTORS.iter().map(|d| (d.name, *d)).collect())
    }
}
