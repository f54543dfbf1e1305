//! Resource entry points
//!
//! Host-facing CRUD operations for one resource type. Each operation runs the
//! service's calls through the [`Dispatcher`] and reports failures as
//! diagnostics rather than errors.

use crate::data::{ResourceData, Timeouts};
use crate::dispatcher::{Dispatcher, ResourceService};
use crate::import::import_state_passthrough_id;
use crate::schema::ResourceDescriptor;
use crate::types::{Diagnostics, Dynamic};
use std::collections::HashMap;
use std::sync::Arc;

pub struct ValidateResourceConfigRequest {
    pub config: HashMap<String, Dynamic>,
}

pub struct ValidateResourceConfigResponse {
    pub diagnostics: Diagnostics,
}

pub struct PlanResourceChangeRequest {
    pub prior_state: ResourceData,
    pub config: HashMap<String, Dynamic>,
}

pub struct PlanResourceChangeResponse {
    /// Attributes whose configured value differs from state
    pub changed: Vec<String>,
    /// Subset of `changed` that forces replacement
    pub requires_replace: Vec<String>,
}

impl PlanResourceChangeResponse {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

pub struct CreateResourceRequest {
    pub config: HashMap<String, Dynamic>,
    pub timeouts: Option<Timeouts>,
}

pub struct CreateResourceResponse {
    pub new_state: Option<ResourceData>,
    pub diagnostics: Diagnostics,
}

pub struct ReadResourceRequest {
    pub current_state: ResourceData,
}

pub struct ReadResourceResponse {
    /// `None` once the resource no longer exists
    pub new_state: Option<ResourceData>,
    pub diagnostics: Diagnostics,
}

pub struct UpdateResourceRequest {
    pub prior_state: ResourceData,
    pub planned_state: HashMap<String, Dynamic>,
    pub timeouts: Option<Timeouts>,
}

pub struct UpdateResourceResponse {
    pub new_state: Option<ResourceData>,
    pub diagnostics: Diagnostics,
}

pub struct DeleteResourceRequest {
    pub prior_state: ResourceData,
}

pub struct DeleteResourceResponse {
    pub diagnostics: Diagnostics,
}

pub struct ImportResourceStateRequest {
    pub id: String,
}

pub struct ImportResourceStateResponse {
    pub imported: Option<ResourceData>,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct Resource {
    service: Arc<dyn ResourceService>,
    dispatcher: Dispatcher,
}

impl Resource {
    pub fn new(service: Arc<dyn ResourceService>, dispatcher: Dispatcher) -> Self {
        Self {
            service,
            dispatcher,
        }
    }

    /// Type name, e.g. "volcengine_acl"
    pub fn type_name(&self) -> &'static str {
        self.service.descriptor().name
    }

    pub fn schema(&self) -> &'static ResourceDescriptor {
        self.service.descriptor()
    }

    fn check_config(&self, config: &HashMap<String, Dynamic>) -> Diagnostics {
        let mut diagnostics = self.schema().validate_config(config);
        diagnostics.extend(self.service.validators().validate(config));
        diagnostics
    }

    pub fn validate(&self, request: ValidateResourceConfigRequest) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: self.check_config(&request.config),
        }
    }

    pub fn plan(&self, request: PlanResourceChangeRequest) -> PlanResourceChangeResponse {
        let changed = request.prior_state.plan_diff(self.schema(), &request.config);
        let requires_replace = changed
            .iter()
            .filter(|name| self.schema().field(name).is_some_and(|f| f.force_new))
            .cloned()
            .collect();
        PlanResourceChangeResponse {
            changed,
            requires_replace,
        }
    }

    pub async fn create(&self, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = self.check_config(&request.config);
        if diagnostics.has_errors() {
            return CreateResourceResponse {
                new_state: None,
                diagnostics,
            };
        }

        let mut data = ResourceData::from_config(request.config)
            .with_timeouts(request.timeouts.unwrap_or_default());
        match self.dispatcher.create(self.service.as_ref(), &mut data).await {
            Ok(()) => CreateResourceResponse {
                new_state: Some(data),
                diagnostics,
            },
            Err(e) => {
                diagnostics.add_error(
                    format!("Failed to create {}", self.type_name()),
                    Some(e.to_string()),
                );
                // a resource that got an id exists remotely and must be tracked
                let new_state = (!data.id().is_empty()).then_some(data);
                CreateResourceResponse {
                    new_state,
                    diagnostics,
                }
            }
        }
    }

    pub async fn read(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut data = request.current_state;
        let mut diagnostics = Diagnostics::new();
        match self.dispatcher.read(self.service.as_ref(), &mut data).await {
            Ok(()) if data.id().is_empty() => ReadResourceResponse {
                new_state: None,
                diagnostics,
            },
            Ok(()) => {
                data.mark_persisted();
                ReadResourceResponse {
                    new_state: Some(data),
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.add_error(
                    format!("Failed to read {} {}", self.type_name(), data.id()),
                    Some(e.to_string()),
                );
                ReadResourceResponse {
                    new_state: Some(data),
                    diagnostics,
                }
            }
        }
    }

    pub async fn update(&self, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = self.check_config(&request.planned_state);
        if diagnostics.has_errors() {
            return UpdateResourceResponse {
                new_state: Some(request.prior_state),
                diagnostics,
            };
        }

        let prior = request.prior_state;
        let mut data = ResourceData::for_update(
            prior.id(),
            prior.values().clone(),
            request.planned_state,
        )
        .with_timeouts(request.timeouts.unwrap_or_default());
        match self.dispatcher.update(self.service.as_ref(), &mut data).await {
            Ok(()) => {
                data.mark_persisted();
                UpdateResourceResponse {
                    new_state: Some(data),
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.add_error(
                    format!("Failed to update {} {}", self.type_name(), prior.id()),
                    Some(e.to_string()),
                );
                UpdateResourceResponse {
                    new_state: Some(prior),
                    diagnostics,
                }
            }
        }
    }

    pub async fn delete(&self, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut data = request.prior_state;
        let mut diagnostics = Diagnostics::new();
        if let Err(e) = self.dispatcher.delete(self.service.as_ref(), &mut data).await {
            diagnostics.add_error(
                format!("Failed to delete {} {}", self.type_name(), data.id()),
                Some(e.to_string()),
            );
        }
        DeleteResourceResponse { diagnostics }
    }

    /// Imports by id and refreshes the state from the remote object
    pub async fn import_state(&self, request: ImportResourceStateRequest) -> ImportResourceStateResponse {
        let response = self
            .read(ReadResourceRequest {
                current_state: import_state_passthrough_id(&request.id),
            })
            .await;
        let mut diagnostics = response.diagnostics;
        if response.new_state.is_none() && !diagnostics.has_errors() {
            diagnostics.add_error(
                format!("Cannot import non-existent remote object {}", request.id),
                None::<String>,
            );
        }
        ImportResourceStateResponse {
            imported: response.new_state,
            diagnostics,
        }
    }
}
