use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tfdispatch::{
    BypassInfo, BypassResponse, CallError, CallExecutor, CallResult, ContentType, HttpMethod,
    Params, UniversalInfo,
};

use super::common::{ApiQueryParams, BypassError, ResponseEnvelope};
use super::error::ApiError;
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, ConnectionStats, RequestOutcome};
use super::signer::{CredentialSigner, Credentials, RequestSigner, SigningContext};

pub const DEFAULT_ENDPOINT: &str = "open.volcengineapi.com";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Volcengine API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    scheme: &'static str,
    /// Buckets are addressed path-style under `base_url` instead of by subdomain
    path_style: bool,
    region: String,
    signer: Box<dyn RequestSigner>,
    pool_manager: ConnectionPoolManager,
}

impl Client {
    /// Create a new API client with default pool configuration
    pub fn new(
        endpoint: &str,
        region: &str,
        credentials: Credentials,
        disable_ssl: bool,
    ) -> Result<Self, ApiError> {
        Self::with_config(
            endpoint,
            region,
            Box::new(CredentialSigner::new(credentials)),
            disable_ssl,
            ConnectionPoolConfig::default(),
        )
    }

    pub fn with_config(
        endpoint: &str,
        region: &str,
        signer: Box<dyn RequestSigner>,
        disable_ssl: bool,
        pool_config: ConnectionPoolConfig,
    ) -> Result<Self, ApiError> {
        if region.is_empty() {
            return Err(ApiError::InvalidEndpoint("region must not be empty".to_string()));
        }
        let scheme = if disable_ssl { "http" } else { "https" };
        let endpoint = endpoint.trim().trim_end_matches('/');
        let (base_url, path_style) = if endpoint.is_empty() {
            (format!("{}://{}", scheme, DEFAULT_ENDPOINT), false)
        } else if endpoint.contains("://") {
            (endpoint.to_string(), true)
        } else {
            (format!("{}://{}", scheme, endpoint), endpoint != DEFAULT_ENDPOINT)
        };
        url::Url::parse(&base_url)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;

        let pool_manager = ConnectionPoolManager::new(pool_config);
        let http_client = pool_manager.build_client(false)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                scheme,
                path_style,
                region: region.to_string(),
                signer,
                pool_manager,
            }),
        })
    }

    pub fn region(&self) -> &str {
        &self.inner.region
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Get connection pool statistics
    pub async fn get_connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// Object storage URL for a bucket (empty for the service root)
    pub fn bypass_url(&self, info: &BypassInfo) -> String {
        let mut url = if self.inner.path_style {
            let mut url = self.inner.base_url.clone();
            if !info.domain.is_empty() {
                url.push('/');
                url.push_str(&urlencoding::encode(&info.domain));
            }
            url
        } else {
            let host = format!("tos-{}.volces.com", self.inner.region);
            if info.domain.is_empty() {
                format!("{}://{}", self.inner.scheme, host)
            } else {
                format!("{}://{}.{}", self.inner.scheme, info.domain, host)
            }
        };
        for segment in &info.path {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        if info.path.is_empty() {
            url.push('/');
        }
        url
    }

    /// One action-based API call; returns the `Result` object of the envelope
    pub async fn call(&self, info: &UniversalInfo, params: &Params) -> Result<Value, ApiError> {
        let query = ApiQueryParams::new()
            .add("Action", &info.action)
            .add("Version", &info.version);
        let (query, body) = match (info.http_method, info.content_type) {
            (_, ContentType::ApplicationJson) => (query, Some(Body::Json(Value::Object(params.clone())))),
            (HttpMethod::Post | HttpMethod::Put, ContentType::Default) => {
                let form = ApiQueryParams::new().extend_params(params).encode();
                (query, Some(Body::Form(form)))
            }
            _ => (query.extend_params(params), None),
        };
        let url = format!("{}/{}", self.inner.base_url, query.to_query_string());
        let encoded = query.encode();

        let context = SigningContext {
            service: &info.service_name,
            region: &self.inner.region,
            method: info.http_method.as_str(),
            path: "/",
            query: &encoded,
        };
        let request = self.request(info.http_method, &url, &context, HeaderMap::new(), body)?;

        tracing::debug!(action = %info.action, service = %info.service_name, "{} {}", info.http_method.as_str(), url);
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        tracing::debug!(action = %info.action, status, "API response body: {}", text);

        let envelope = match serde_json::from_str::<ResponseEnvelope>(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.record(RequestOutcome::Failed).await;
                return Err(if status == 401 {
                    ApiError::AuthError
                } else if !(200..300).contains(&status) {
                    ApiError::HttpError { status, message: text }
                } else {
                    tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
                    ApiError::ParseError(format!("{}: {}", info.action, e))
                });
            }
        };

        if let Some(error) = envelope.metadata.error {
            let outcome = if is_throttled(&error.code) || status == 429 {
                RequestOutcome::Throttled
            } else {
                RequestOutcome::Failed
            };
            self.record(outcome).await;
            return Err(ApiError::from_response_error(
                &info.action,
                status,
                &envelope.metadata.request_id,
                error,
            ));
        }

        self.record(RequestOutcome::Success).await;
        Ok(envelope.result)
    }

    /// One object storage call; the body is parsed as JSON when possible
    pub async fn call_bypass(
        &self,
        info: &BypassInfo,
        body: Option<&Value>,
    ) -> Result<BypassResponse, ApiError> {
        let mut query = ApiQueryParams::new();
        for (key, value) in &info.url_params {
            query = query.add(key.as_str(), value);
        }
        let url = format!("{}{}", self.bypass_url(info), query.to_query_string());

        let mut headers = HeaderMap::new();
        for (key, value) in &info.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ApiError::ParseError(format!("invalid header {}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::ParseError(format!("invalid header {}: {}", key, e)))?;
            headers.insert(name, value);
        }
        let body = body.map(|value| Body::Json(value.clone()));
        let path = url
            .split_once("://")
            .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
            .unwrap_or("/");
        let encoded = query.encode();
        let context = SigningContext {
            service: "tos",
            region: &self.inner.region,
            method: info.http_method.as_str(),
            path,
            query: &encoded,
        };
        let request = self.request(info.http_method, &url, &context, headers, body)?;

        tracing::debug!(call = %info.describe(), "{} {}", info.http_method.as_str(), url);
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let text = response.text().await?;
        tracing::debug!(call = %info.describe(), status, "API response body: {}", text);

        if !(200..300).contains(&status) {
            let outcome = if status == 429 {
                RequestOutcome::Throttled
            } else {
                RequestOutcome::Failed
            };
            self.record(outcome).await;
            return Err(match serde_json::from_str::<BypassError>(&text) {
                Ok(error) if !error.code.is_empty() => ApiError::ServiceError {
                    action: info.describe(),
                    status,
                    code: error.code,
                    message: error.message,
                    request_id: error.request_id,
                },
                _ => ApiError::HttpError { status, message: text },
            });
        }

        self.record(RequestOutcome::Success).await;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(BypassResponse {
            status,
            headers,
            body,
        })
    }

    fn request(
        &self,
        method: HttpMethod,
        url: &str,
        context: &SigningContext<'_>,
        mut headers: HeaderMap,
        body: Option<Body>,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        self.inner.signer.sign(context, &mut headers)?;
        let client = &self.inner.http_client;
        let builder = match method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
            HttpMethod::Put => client.put(url),
            HttpMethod::Head => client.head(url),
            HttpMethod::Delete => client.delete(url),
        }
        .headers(headers);

        Ok(match body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Form(form)) => builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(form),
            None => builder,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        match request.send().await {
            Ok(response) => Ok(response),
            Err(e) => {
                self.record(RequestOutcome::Failed).await;
                if e.is_timeout() {
                    let timeout = self.inner.pool_manager.config().request_timeout.as_secs();
                    Err(ApiError::Timeout(timeout))
                } else {
                    Err(ApiError::RequestError(e))
                }
            }
        }
    }

    async fn record(&self, outcome: RequestOutcome) {
        self.inner.pool_manager.record_request(outcome).await;
    }
}

enum Body {
    Json(Value),
    Form(String),
}

fn is_throttled(code: &str) -> bool {
    code.contains("Throttling") || code.contains("FlowLimit") || code.contains("RequestLimitExceeded")
}

#[async_trait]
impl CallExecutor for Client {
    async fn universal(&self, info: &UniversalInfo, params: &Params) -> CallResult<Value> {
        self.call(info, params).await.map_err(CallError::from)
    }

    async fn bypass(&self, info: &BypassInfo, body: Option<&Value>) -> CallResult<BypassResponse> {
        self.call_bypass(info, body).await.map_err(CallError::from)
    }
}
