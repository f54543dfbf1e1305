//! Dispatcher: drives service calls for every CRUD and data source operation

use crate::call::{
    BypassResponse, CallExecutor, CallStage, CallTarget, ContentType, OnError, SdkCall,
};
use crate::data::{Operation, ResourceData};
use crate::error::{DispatchError, Result};
use crate::locks::KeyedMutex;
use crate::refresh::StatePoller;
use crate::request::{ConvertMode, Params, RequestBuilder, RequestConverts};
use crate::response::{fit_to_field, ResponseConverts, ResponseMapper};
use crate::schema::ResourceDescriptor;
use crate::types::Dynamic;
use crate::validator::AttributeValidators;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// One managed resource type: how to read it and which calls change it
#[async_trait]
pub trait ResourceService: Send + Sync {
    fn descriptor(&self) -> &'static ResourceDescriptor;

    /// Fetches the remote object; a not-found error when it does not exist
    async fn read_resource(&self, data: &ResourceData, id: &str) -> Result<Value>;

    /// Status used by refresh polling; `None` when the resource is gone
    async fn resource_status(&self, data: &ResourceData, id: &str) -> Result<Option<String>> {
        match self.read_resource(data, id).await {
            Ok(raw) => Ok(raw.get("Status").and_then(Value::as_str).map(str::to_string)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn response_converts(&self) -> ResponseConverts {
        ResponseConverts::new()
    }

    /// Value rules checked on validate, create and update
    fn validators(&self) -> AttributeValidators {
        AttributeValidators::new()
    }

    /// Derived attributes the generic mapping cannot produce
    fn after_read(&self, _data: &mut ResourceData, _raw: &Value) -> Result<()> {
        Ok(())
    }

    fn create_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>>;

    fn modify_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>>;

    fn remove_resource(&self, data: &ResourceData) -> Result<Vec<SdkCall>>;
}

pub type ExtraDataFn = fn(&mut HashMap<String, Dynamic>, &Value) -> Result<()>;
pub type ClientFilterFn = fn(&ResourceData, &Value) -> bool;

/// How a data source turns its arguments into a query and its results into state
pub struct DataSourceInfo {
    pub convert_mode: ConvertMode,
    pub content_type: ContentType,
    pub request_converts: RequestConverts,
    pub response_converts: ResponseConverts,
    /// Remote field matched against `name_regex`
    pub name_field: Option<&'static str>,
    /// Remote id field of one result item
    pub id_field: &'static str,
    /// Block attribute receiving the results
    pub collection_field: &'static str,
    pub extra_data: Option<ExtraDataFn>,
    pub client_filter: Option<ClientFilterFn>,
}

impl DataSourceInfo {
    pub fn new(id_field: &'static str, collection_field: &'static str) -> Self {
        Self {
            convert_mode: ConvertMode::ConvertAll,
            content_type: ContentType::Default,
            request_converts: RequestConverts::new(),
            response_converts: ResponseConverts::new(),
            name_field: None,
            id_field,
            collection_field,
            extra_data: None,
            client_filter: None,
        }
    }
}

#[async_trait]
pub trait DataSourceService: Send + Sync {
    fn descriptor(&self) -> &'static ResourceDescriptor;

    fn datasource_info(&self) -> DataSourceInfo;

    /// Every remote object matching the query; pagination is the service's job
    async fn read_resources(&self, condition: Params) -> Result<Vec<Value>>;
}

#[derive(Clone)]
pub struct Dispatcher {
    executor: Arc<dyn CallExecutor>,
    locks: KeyedMutex,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn CallExecutor>) -> Self {
        Self {
            executor,
            locks: KeyedMutex::new(),
        }
    }

    pub fn executor(&self) -> &Arc<dyn CallExecutor> {
        &self.executor
    }

    pub async fn create(&self, service: &dyn ResourceService, data: &mut ResourceData) -> Result<()> {
        let name = service.descriptor().name;
        data.bind_descriptor(service.descriptor());
        let calls = service.create_resource(data)?;
        if let Err(e) = self.run_calls(service, data, calls, Operation::Create).await {
            error!(resource = name, error = %e, "Create failed");
            return Err(e);
        }
        info!(resource = name, id = %data.id(), "Created resource");
        self.read(service, data).await?;
        data.mark_persisted();
        Ok(())
    }

    /// Refreshes `data` from the remote object. A vanished resource clears the id.
    pub async fn read(&self, service: &dyn ResourceService, data: &mut ResourceData) -> Result<()> {
        let name = service.descriptor().name;
        data.bind_descriptor(service.descriptor());
        let id = data.id().to_string();
        let raw = match service.read_resource(data, &id).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() && !data.is_new_resource() => {
                warn!(resource = name, id = %id, "Resource not found, removing from state");
                data.set_id("");
                return Ok(());
            }
            Err(e) => {
                error!(resource = name, id = %id, error = %e, "Read failed");
                return Err(e);
            }
        };

        let converts = service.response_converts();
        ResponseMapper::new(&converts).write(service.descriptor(), &raw, data);
        service.after_read(data, &raw)
    }

    pub async fn update(&self, service: &dyn ResourceService, data: &mut ResourceData) -> Result<()> {
        let name = service.descriptor().name;
        data.bind_descriptor(service.descriptor());
        let calls = service.modify_resource(data)?;
        if let Err(e) = self.run_calls(service, data, calls, Operation::Update).await {
            error!(resource = name, id = %data.id(), error = %e, "Update failed");
            return Err(e);
        }
        self.read(service, data).await
    }

    pub async fn delete(&self, service: &dyn ResourceService, data: &mut ResourceData) -> Result<()> {
        let name = service.descriptor().name;
        data.bind_descriptor(service.descriptor());
        let calls = service.remove_resource(data)?;
        if let Err(e) = self.run_calls(service, data, calls, Operation::Delete).await {
            error!(resource = name, id = %data.id(), error = %e, "Delete failed");
            return Err(e);
        }
        info!(resource = name, id = %data.id(), "Deleted resource");
        data.set_id("");
        Ok(())
    }

    /// Runs a data source query and writes the filtered results into `data`
    pub async fn data(&self, service: &dyn DataSourceService, data: &mut ResourceData) -> Result<()> {
        let descriptor = service.descriptor();
        let info = service.datasource_info();
        let collection = descriptor.field(info.collection_field).ok_or_else(|| {
            DispatchError::Custom(format!(
                "{} has no attribute {}",
                descriptor.name, info.collection_field
            ))
        })?;

        let condition = RequestBuilder::new(
            descriptor,
            info.convert_mode,
            &info.request_converts,
            info.content_type,
        )
        .build(data)?;
        let mut items = service.read_resources(condition).await?;

        if let (Some(name_field), Some(pattern)) = (info.name_field, data.get_string("name_regex")) {
            let regex = Regex::new(pattern).map_err(|e| {
                DispatchError::Validation(format!("invalid name_regex {}: {}", pattern, e))
            })?;
            items.retain(|item| {
                item.get(name_field)
                    .and_then(Value::as_str)
                    .map(|name| regex.is_match(name))
                    .unwrap_or(false)
            });
        }
        if let Some(filter) = info.client_filter {
            let snapshot: &ResourceData = data;
            items.retain(|item| filter(snapshot, item));
        }

        let mapper = ResponseMapper::new(&info.response_converts);
        let mut ids = Vec::with_capacity(items.len());
        let mut entries = Vec::with_capacity(items.len());
        for item in &items {
            let mut mapped = mapper.map(item);
            if let Some(extra) = info.extra_data {
                extra(&mut mapped, item)?;
            }
            if let Some(id) = item.get(info.id_field).and_then(scalar_string) {
                mapped.insert("id".to_string(), Dynamic::String(id.clone()));
                ids.push(id);
            }
            entries.push(Dynamic::Map(mapped));
        }
        let total = entries.len();
        debug!(data_source = descriptor.name, count = total, "Read data source");

        data.set(
            info.collection_field,
            fit_to_field(collection, &Dynamic::List(entries)),
        );
        if descriptor.field("total_count").is_some() {
            data.set("total_count", Dynamic::Number(total as f64));
        }
        if descriptor.field("ids").is_some() {
            data.set("ids", Dynamic::List(ids.iter().map(Dynamic::string).collect()));
        }
        data.set_id(hash_ids(&ids));
        Ok(())
    }

    async fn run_calls(
        &self,
        service: &dyn ResourceService,
        data: &mut ResourceData,
        calls: Vec<SdkCall>,
        operation: Operation,
    ) -> Result<()> {
        for call in calls {
            self.run_call(service, data, call, operation).await?;
        }
        Ok(())
    }

    /// Validate -> Execute -> Finalize -> Poll for a single call
    pub async fn run_call(
        &self,
        service: &dyn ResourceService,
        data: &mut ResourceData,
        call: SdkCall,
        operation: Operation,
    ) -> Result<()> {
        let action = call.action();
        let mut params = Params::new();
        let mut response = Value::Null;
        let mut _guard = None;

        for stage in CallStage::PIPELINE {
            trace!(action = %action, stage = ?stage, "Running call stage");
            match stage {
                CallStage::Validate => {
                    params.extend(
                        RequestBuilder::new(
                            service.descriptor(),
                            call.convert_mode,
                            &call.converts,
                            call.target.content_type(),
                        )
                        .build(data)?,
                    );
                    if let Some(field) = call.request_id_field {
                        params.insert(field.to_string(), Value::from(data.id()));
                    }
                    if let Some(before) = &call.before_call {
                        if !before(data, &mut params)? {
                            debug!(action = %action, "Call skipped by before_call");
                            return Ok(());
                        }
                    }
                }
                CallStage::Execute => {
                    if let Some(key) = &call.lock_key {
                        _guard = Some(self.locks.lock(key).await);
                    }
                    response = self.execute(service, data, &call, &action, &params).await?;
                }
                CallStage::Finalize => {
                    if let Some(after) = &call.after_call {
                        after(data, &response)?;
                    }
                }
                CallStage::Poll => {
                    if let Some(refresh) = &call.refresh {
                        let id = data.id().to_string();
                        let snapshot: &ResourceData = data;
                        StatePoller::new(refresh, &id, snapshot.timeout(operation))
                            .wait(|| service.resource_status(snapshot, &id))
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        service: &dyn ResourceService,
        data: &ResourceData,
        call: &SdkCall,
        action: &str,
        params: &Params,
    ) -> Result<Value> {
        let started = Instant::now();
        loop {
            debug!(action = %action, id = %data.id(), "Calling remote action");
            let result = match &call.target {
                CallTarget::Universal(info) => self.executor.universal(info, params).await,
                CallTarget::Bypass(info) => {
                    let body = (!params.is_empty()).then(|| Value::Object(params.clone()));
                    self.executor
                        .bypass(info, body.as_ref())
                        .await
                        .map(BypassResponse::into_value)
                }
            };
            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            match call.on_error {
                OnError::Propagate => {}
                OnError::IgnoreNotFound => {
                    if err.is_not_found() {
                        return Ok(Value::Null);
                    }
                }
                OnError::RetryUntilGone { timeout, interval } => {
                    if err.is_not_found() {
                        return Ok(Value::Null);
                    }
                    match service.read_resource(data, data.id()).await {
                        Err(e) if e.is_not_found() => return Ok(Value::Null),
                        _ => {}
                    }
                    if started.elapsed() + interval < timeout {
                        warn!(action = %action, id = %data.id(), error = %err, "Call failed, retrying");
                        tokio::time::sleep(interval).await;
                        continue;
                    }
                }
                OnError::Retry {
                    timeout,
                    interval,
                    retryable,
                } => {
                    if retryable(&err) && started.elapsed() + interval < timeout {
                        warn!(action = %action, id = %data.id(), error = %err, "Call failed, retrying");
                        tokio::time::sleep(interval).await;
                        continue;
                    }
                }
            }
            return Err(DispatchError::call(action, data.id(), err));
        }
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Stable id for a data source result set
pub fn hash_ids(ids: &[String]) -> String {
    let mut hasher = DefaultHasher::new();
    ids.hash(&mut hasher);
    hasher.finish().to_string()
}
