//! Data source entry point

use crate::data::ResourceData;
use crate::dispatcher::{DataSourceService, Dispatcher};
use crate::schema::ResourceDescriptor;
use crate::types::{Diagnostics, Dynamic};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ReadDataSourceRequest {
    pub config: HashMap<String, Dynamic>,
}

pub struct ReadDataSourceResponse {
    pub state: Option<ResourceData>,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct DataSource {
    service: Arc<dyn DataSourceService>,
    dispatcher: Dispatcher,
}

impl DataSource {
    pub fn new(service: Arc<dyn DataSourceService>, dispatcher: Dispatcher) -> Self {
        Self {
            service,
            dispatcher,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.service.descriptor().name
    }

    pub fn schema(&self) -> &'static ResourceDescriptor {
        self.service.descriptor()
    }

    pub async fn read(&self, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = self.schema().validate_config(&request.config);
        if diagnostics.has_errors() {
            return ReadDataSourceResponse {
                state: None,
                diagnostics,
            };
        }

        let mut data = ResourceData::from_config(request.config);
        match self.dispatcher.data(self.service.as_ref(), &mut data).await {
            Ok(()) => ReadDataSourceResponse {
                state: Some(data),
                diagnostics,
            },
            Err(e) => {
                diagnostics.add_error(
                    format!("Failed to read data source {}", self.type_name()),
                    Some(e.to_string()),
                );
                ReadDataSourceResponse {
                    state: None,
                    diagnostics,
                }
            }
        }
    }
}
