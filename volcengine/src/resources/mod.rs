//! Resource implementations

pub mod clb;
pub mod ecs;
pub mod iam;
pub mod nat;
pub mod tos;
pub mod vke;
pub mod vpc;

pub use clb::AclService;
pub use ecs::EcsInstanceStateService;
pub use iam::IamRoleService;
pub use nat::NatGatewayService;
pub use tos::TosBucketService;
pub use vke::VkeClusterService;
pub use vpc::SecurityGroupRuleService;

use crate::api::Client;
use serde_json::Value;
use tfdispatch::pagination::value_at;
use tfdispatch::{CallExecutor, DispatchError, Params, Result, UniversalInfo};

/// Runs a read action; failures carry the action and resource id
pub(crate) async fn describe(
    client: &Client,
    info: &UniversalInfo,
    params: &Params,
    id: &str,
) -> Result<Value> {
    client
        .universal(info, params)
        .await
        .map_err(|e| DispatchError::call(&info.action, id, e))
}

/// First element of the list at `path`, not-found when the list is empty
pub(crate) fn first_item(response: &Value, path: &str, id: &str) -> Result<Value> {
    value_at(response, path)
        .and_then(Value::as_array)
        .and_then(|items| items.first().cloned())
        .ok_or_else(|| DispatchError::NotFound(id.to_string()))
}

pub(crate) fn id_params(field: &str, id: &str) -> Params {
    let mut params = Params::new();
    params.insert(field.to_string(), Value::from(id));
    params
}
