//! Service registry: API version, method and encoding per service

use tfdispatch::{BypassInfo, ContentType, HttpMethod, UniversalInfo};

/// Services reachable through the action-based OpenAPI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Clb,
    Vpc,
    NatGateway,
    Iam,
    Ecs,
    Vke,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Clb,
        Service::Vpc,
        Service::NatGateway,
        Service::Iam,
        Service::Ecs,
        Service::Vke,
    ];

    /// Service name used in the credential scope
    pub fn name(self) -> &'static str {
        match self {
            Service::Clb => "clb",
            Service::Vpc => "vpc",
            Service::NatGateway => "natgateway",
            Service::Iam => "iam",
            Service::Ecs => "ecs",
            Service::Vke => "vke",
        }
    }

    pub fn version(self) -> &'static str {
        match self {
            Service::Clb | Service::Vpc | Service::NatGateway | Service::Ecs => "2020-04-01",
            Service::Iam => "2018-01-01",
            Service::Vke => "2022-05-12",
        }
    }

    fn http_method(self) -> HttpMethod {
        match self {
            Service::Vke => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }

    fn content_type(self) -> ContentType {
        match self {
            Service::Vke => ContentType::ApplicationJson,
            _ => ContentType::Default,
        }
    }

    /// Addressing of `action` with the service defaults
    pub fn action(self, action: &str) -> UniversalInfo {
        UniversalInfo {
            service_name: self.name().to_string(),
            version: self.version().to_string(),
            action: action.to_string(),
            http_method: self.http_method(),
            content_type: self.content_type(),
        }
    }

    /// Same action sent as a POST with a form body
    pub fn post(self, action: &str) -> UniversalInfo {
        UniversalInfo {
            http_method: HttpMethod::Post,
            ..self.action(action)
        }
    }
}

/// Object storage calls bypass the action API and address buckets directly
pub fn bucket(method: HttpMethod, bucket: &str) -> BypassInfo {
    BypassInfo::new(method, bucket)
}

/// `GET /` on the service root lists buckets
pub fn list_buckets() -> BypassInfo {
    BypassInfo::new(HttpMethod::Get, "")
}
