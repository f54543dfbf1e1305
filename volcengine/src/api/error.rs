use thiserror::Error;
use tfdispatch::CallError;

use super::common::ResponseError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Error carried in `ResponseMetadata.Error` of the response envelope
    #[error("{action} returned {code}: {message} (request id {request_id})")]
    ServiceError {
        action: String,
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    /// Non-success status without a parseable error body
    #[error("API returned error (HTTP {status}): {message}")]
    HttpError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),
}

impl ApiError {
    pub fn from_response_error(action: &str, status: u16, request_id: &str, error: ResponseError) -> Self {
        ApiError::ServiceError {
            action: action.to_string(),
            status,
            code: error.code,
            message: error.message,
            request_id: request_id.to_string(),
        }
    }
}

impl From<ApiError> for CallError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::ServiceError {
                status,
                ref code,
                ref message,
                ..
            } => {
                let (code, message) = (code.clone(), message.clone());
                CallError::new(message)
                    .with_code(code)
                    .with_status(status)
                    .with_source(err)
            }
            ApiError::HttpError { status, ref message } => {
                let message = message.clone();
                CallError::new(message).with_status(status).with_source(err)
            }
            ApiError::AuthError => {
                CallError::new(err.to_string()).with_status(401).with_source(err)
            }
            other => CallError::new(other.to_string()).with_source(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_keep_code_and_status() {
        let err = ApiError::ServiceError {
            action: "DescribeAclAttributes".to_string(),
            status: 404,
            code: "InvalidAcl.NotFound".to_string(),
            message: "The specified acl is not found".to_string(),
            request_id: "req-1".to_string(),
        };
        assert!(err.to_string().contains("InvalidAcl.NotFound"));

        let call: CallError = err.into();
        assert_eq!(call.code.as_deref(), Some("InvalidAcl.NotFound"));
        assert_eq!(call.status, Some(404));
        assert!(call.is_not_found());
    }

    #[test]
    fn http_errors_map_status_only() {
        let call: CallError = ApiError::HttpError {
            status: 404,
            message: "NoSuchBucket".to_string(),
        }
        .into();
        assert!(call.code.is_none());
        assert!(call.is_not_found());
    }
}
