//! tfdispatch - generic CRUD dispatch engine for Terraform providers
//!
//! Resource types are declared as static descriptors plus a service that
//! lists the remote calls of each operation. The dispatcher builds request
//! parameters, runs the calls, polls until the target status and maps the
//! responses back into resource data.

// Core modules
pub mod error;
pub mod naming;
pub mod schema;
pub mod types;

// Engine modules
pub mod call;
pub mod data;
pub mod dispatcher;
pub mod refresh;
pub mod request;
pub mod response;

// Entry points
pub mod data_source;
pub mod resource;

// Helper modules
pub mod import;
pub mod locks;
pub mod pagination;
pub mod tags;
pub mod validator;

// Re-exports for convenience
pub use call::{
    BypassInfo, BypassResponse, CallExecutor, CallResult, CallStage, CallTarget, ContentType,
    HttpMethod, OnError, SdkCall, UniversalInfo,
};
pub use data::{Operation, ResourceData, Timeouts};
pub use data_source::DataSource;
pub use dispatcher::{DataSourceInfo, DataSourceService, Dispatcher, ResourceService};
pub use error::{CallError, DispatchError, Result};
pub use import::{import_state_passthrough_id, parse_composite_id};
pub use refresh::{StatePoller, StateRefresh};
pub use request::{ConvertMode, ConvertType, Params, RequestBuilder, RequestConvert, RequestConverts};
pub use resource::Resource;
pub use response::{ResponseConvert, ResponseConverts, ResponseMapper};
pub use schema::{AttributeType, FieldKind, FieldSpec, ResourceDescriptor};
pub use types::{Diagnostic, DiagnosticSeverity, Diagnostics, Dynamic};
