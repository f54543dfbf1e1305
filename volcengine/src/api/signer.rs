//! Request signing seam

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use super::error::ApiError;

pub const DATE_HEADER: &str = "x-date";
pub const SECURITY_TOKEN_HEADER: &str = "x-security-token";

/// Everything a signer may bind the signature to
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    pub service: &'a str,
    pub region: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
}

pub trait RequestSigner: Send + Sync {
    fn sign(&self, context: &SigningContext<'_>, headers: &mut HeaderMap) -> Result<(), ApiError>;
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into()).filter(|t| !t.is_empty());
        self
    }
}

// secrets stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Attaches the request date, the credential scope and the session token.
///
/// The `Authorization` header it writes has no `Signature=` part, so the
/// public endpoint rejects it. It serves mock servers and signing gateways;
/// talking to Volcengine directly needs a `RequestSigner` that computes the
/// HMAC-SHA256 signature, passed to `Client::with_config`.
#[derive(Debug, Clone)]
pub struct CredentialSigner {
    credentials: Credentials,
}

impl CredentialSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    fn sign_at(
        &self,
        context: &SigningContext<'_>,
        headers: &mut HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        if self.credentials.access_key.is_empty() || self.credentials.secret_key.is_empty() {
            return Err(ApiError::AuthError);
        }

        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!(
            "{}/{}/{}/request",
            now.format("%Y%m%d"),
            context.region,
            context.service
        );
        let authorization = format!(
            "HMAC-SHA256 Credential={}/{}, SignedHeaders=x-date",
            self.credentials.access_key, scope
        );

        insert(headers, HeaderName::from_static(DATE_HEADER), &timestamp)?;
        insert(headers, AUTHORIZATION, &authorization)?;
        if let Some(token) = &self.credentials.session_token {
            insert(headers, HeaderName::from_static(SECURITY_TOKEN_HEADER), token)?;
        }
        Ok(())
    }
}

impl RequestSigner for CredentialSigner {
    fn sign(&self, context: &SigningContext<'_>, headers: &mut HeaderMap) -> Result<(), ApiError> {
        self.sign_at(context, headers, Utc::now())
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), ApiError> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| ApiError::ParseError(format!("invalid header {}: {}", name, e)))?;
    headers.insert(name, value);
    Ok(())
}
