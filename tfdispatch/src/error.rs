//! Error types for tfdispatch

use std::fmt;
use std::time::Duration;

/// Error returned by a [`CallExecutor`](crate::call::CallExecutor).
///
/// Transport and API failures are carried as-is; the dispatcher adds the
/// action and resource id context when it wraps them.
#[derive(Debug)]
pub struct CallError {
    pub code: Option<String>,
    pub status: Option<u16>,
    pub message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Remote "does not exist" answers: HTTP 404 or any `*NotFound` / `NoSuch*` code.
    pub fn is_not_found(&self) -> bool {
        if self.status == Some(404) {
            return true;
        }
        match &self.code {
            Some(code) => {
                code.ends_with("NotFound")
                    || code.contains(".NotFound")
                    || code.starts_with("NoSuch")
                    || code.contains("NotExist")
            }
            None => false,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.status) {
            (Some(code), _) => write!(f, "[{}] {}", code, self.message),
            (None, Some(status)) => write!(f, "HTTP {}: {}", status, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Error type for dispatch operations
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{action} failed for resource {id}: {source}")]
    Call {
        action: String,
        id: String,
        #[source]
        source: CallError,
    },

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Resource {id} entered failure state {status}")]
    FailState { id: String, status: String },

    #[error("Timeout after {timeout:?} waiting for resource {id} to reach {target:?} (last status: {last:?})")]
    Timeout {
        id: String,
        target: Vec<String>,
        last: Option<String>,
        timeout: Duration,
    },

    #[error("Conversion error: {0}")]
    Convert(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Provider not configured")]
    ProviderNotConfigured,

    #[error("Resource type not found: {0}")]
    ResourceTypeNotFound(String),

    #[error("Data source type not found: {0}")]
    DataSourceTypeNotFound(String),

    #[error("{0}")]
    Custom(String),
}

impl DispatchError {
    pub fn call(action: impl Into<String>, id: impl Into<String>, source: CallError) -> Self {
        DispatchError::Call {
            action: action.into(),
            id: id.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            DispatchError::NotFound(_) => true,
            DispatchError::Call { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

impl From<String> for DispatchError {
    fn from(s: String) -> Self {
        DispatchError::Custom(s)
    }
}

impl From<&str> for DispatchError {
    fn from(s: &str) -> Self {
        DispatchError::Custom(s.to_string())
    }
}
