//! Volcengine API transport: action-based OpenAPI calls and object storage calls

pub mod client;
pub mod common;
pub mod error;
pub mod pool;
pub mod signer;
pub mod universal;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, DEFAULT_ENDPOINT};
pub use common::ApiQueryParams;
pub use error::ApiError;
pub use pool::{ConnectionPoolConfig, ConnectionStats};
pub use signer::{CredentialSigner, Credentials, RequestSigner, SigningContext};
pub use universal::Service;
