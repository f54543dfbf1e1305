//! SdkCall: one declarative remote action plus its pipeline hooks

use crate::data::ResourceData;
use crate::error::{CallError, Result};
use crate::refresh::StateRefresh;
use crate::request::{ConvertMode, Params, RequestConverts};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Head,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Head => "HEAD",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Request encoding. `Default` is flat query/form parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    Default,
    ApplicationJson,
}

/// Addressing of an action-based API call
#[derive(Debug, Clone, PartialEq)]
pub struct UniversalInfo {
    pub service_name: String,
    pub version: String,
    pub action: String,
    pub http_method: HttpMethod,
    pub content_type: ContentType,
}

/// Addressing of an object-storage style REST call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BypassInfo {
    pub http_method: HttpMethod,
    /// Bucket-style subdomain, empty for the service root
    pub domain: String,
    pub path: Vec<String>,
    pub headers: BTreeMap<String, String>,
    pub url_params: BTreeMap<String, String>,
    pub content_type: ContentType,
}

impl BypassInfo {
    pub fn new(http_method: HttpMethod, domain: impl Into<String>) -> Self {
        Self {
            http_method,
            domain: domain.into(),
            ..Self::default()
        }
    }

    pub fn path(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn url_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(key.into(), value.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.content_type = ContentType::ApplicationJson;
        self
    }

    /// Name used in logs and error context
    pub fn describe(&self) -> String {
        let mut text = format!("{} {}", self.http_method.as_str(), self.domain);
        for segment in &self.path {
            text.push('/');
            text.push_str(segment);
        }
        text
    }
}

#[derive(Debug, Clone, Default)]
pub struct BypassResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl BypassResponse {
    /// `{"Status": .., "Headers": {..}, "Body": ..}`
    pub fn into_value(self) -> Value {
        let headers: Map<String, Value> = self
            .headers
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let mut object = Map::new();
        object.insert("Status".to_string(), Value::from(self.status));
        object.insert("Headers".to_string(), Value::Object(headers));
        object.insert("Body".to_string(), self.body);
        Value::Object(object)
    }
}

pub type CallResult<T> = std::result::Result<T, CallError>;

/// Issues remote calls. No retries happen at this layer.
#[async_trait]
pub trait CallExecutor: Send + Sync {
    /// Action-based call; returns the `Result` object of the response
    async fn universal(&self, info: &UniversalInfo, params: &Params) -> CallResult<Value>;

    async fn bypass(&self, info: &BypassInfo, body: Option<&Value>) -> CallResult<BypassResponse>;
}

#[derive(Debug, Clone)]
pub enum CallTarget {
    Universal(UniversalInfo),
    Bypass(BypassInfo),
}

impl CallTarget {
    pub fn action(&self) -> String {
        match self {
            CallTarget::Universal(info) => info.action.clone(),
            CallTarget::Bypass(info) => info.describe(),
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            CallTarget::Universal(info) => info.content_type,
            CallTarget::Bypass(info) => info.content_type,
        }
    }
}

/// Stages every call passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
    /// Build parameters and run `before_call`; may veto the call
    Validate,
    Execute,
    /// Run `after_call` on the response
    Finalize,
    /// Wait for the refresh target, when one is set
    Poll,
}

impl CallStage {
    pub const PIPELINE: [CallStage; 4] = [
        CallStage::Validate,
        CallStage::Execute,
        CallStage::Finalize,
        CallStage::Poll,
    ];
}

/// What to do when the Execute stage fails
#[derive(Debug, Clone, Copy)]
pub enum OnError {
    Propagate,
    /// A not-found answer counts as success
    IgnoreNotFound,
    /// Delete semantics: re-read after each failure; gone means done,
    /// otherwise retry the call until the window closes
    RetryUntilGone {
        timeout: Duration,
        interval: Duration,
    },
    /// Retry while the predicate accepts the error
    Retry {
        timeout: Duration,
        interval: Duration,
        retryable: fn(&CallError) -> bool,
    },
}

impl OnError {
    /// The 15 minute retry window used by deletes
    pub fn delete_retry() -> Self {
        OnError::RetryUntilGone {
            timeout: Duration::from_secs(15 * 60),
            interval: Duration::from_secs(5),
        }
    }
}

pub type BeforeCallFn = Box<dyn Fn(&ResourceData, &mut Params) -> Result<bool> + Send + Sync>;
pub type AfterCallFn = Box<dyn Fn(&mut ResourceData, &Value) -> Result<()> + Send + Sync>;

pub struct SdkCall {
    pub target: CallTarget,
    pub convert_mode: ConvertMode,
    pub converts: RequestConverts,
    /// Parameter that receives the resource id
    pub request_id_field: Option<&'static str>,
    /// Calls sharing a key never run concurrently within the process
    pub lock_key: Option<String>,
    pub before_call: Option<BeforeCallFn>,
    pub after_call: Option<AfterCallFn>,
    pub on_error: OnError,
    pub refresh: Option<StateRefresh>,
}

impl SdkCall {
    pub fn universal(info: UniversalInfo) -> Self {
        Self::new(CallTarget::Universal(info))
    }

    pub fn bypass(info: BypassInfo) -> Self {
        Self::new(CallTarget::Bypass(info)).convert_mode(ConvertMode::Ignore)
    }

    fn new(target: CallTarget) -> Self {
        Self {
            target,
            convert_mode: ConvertMode::ConvertAll,
            converts: RequestConverts::new(),
            request_id_field: None,
            lock_key: None,
            before_call: None,
            after_call: None,
            on_error: OnError::Propagate,
            refresh: None,
        }
    }

    pub fn action(&self) -> String {
        self.target.action()
    }

    pub fn convert_mode(mut self, mode: ConvertMode) -> Self {
        self.convert_mode = mode;
        self
    }

    pub fn converts(mut self, converts: RequestConverts) -> Self {
        self.converts = converts;
        self
    }

    pub fn request_id_field(mut self, field: &'static str) -> Self {
        self.request_id_field = Some(field);
        self
    }

    pub fn lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = Some(key.into());
        self
    }

    pub fn before_call<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResourceData, &mut Params) -> Result<bool> + Send + Sync + 'static,
    {
        self.before_call = Some(Box::new(hook));
        self
    }

    pub fn after_call<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ResourceData, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.after_call = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, policy: OnError) -> Self {
        self.on_error = policy;
        self
    }

    pub fn refresh(mut self, refresh: StateRefresh) -> Self {
        self.refresh = Some(refresh);
        self
    }
}

impl fmt::Debug for SdkCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkCall")
            .field("target", &self.target)
            .field("convert_mode", &self.convert_mode)
            .field("converts", &self.converts.keys().collect::<Vec<_>>())
            .field("request_id_field", &self.request_id_field)
            .field("lock_key", &self.lock_key)
            .field("before_call", &self.before_call.is_some())
            .field("after_call", &self.after_call.is_some())
            .field("on_error", &self.on_error)
            .field("refresh", &self.refresh)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_info_describes_path() {
        let info = BypassInfo::new(HttpMethod::Put, "my-bucket")
            .path("object")
            .header("x-tos-acl", "private")
            .url_param("acl", "");
        assert_eq!(info.describe(), "PUT my-bucket/object");
        assert_eq!(info.headers.get("x-tos-acl").unwrap(), "private");
        assert!(info.url_params.contains_key("acl"));
    }

    #[test]
    fn bypass_response_becomes_object() {
        let mut headers = HashMap::new();
        headers.insert("x-tos-bucket-region".to_string(), "cn-beijing".to_string());
        let value = BypassResponse {
            status: 200,
            headers,
            body: serde_json::json!({"Grants": []}),
        }
        .into_value();
        assert_eq!(value["Status"], 200);
        assert_eq!(value["Headers"]["x-tos-bucket-region"], "cn-beijing");
        assert!(value["Body"]["Grants"].is_array());
    }

    #[test]
    fn bypass_calls_default_to_manual_params() {
        let call = SdkCall::bypass(BypassInfo::new(HttpMethod::Delete, "b"));
        assert_eq!(call.convert_mode, ConvertMode::Ignore);
        assert_eq!(call.action(), "DELETE b");
    }
}
