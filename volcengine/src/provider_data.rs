//! Shared handles passed to every resource and data source

use crate::api::Client;
use std::sync::Arc;
use tfdispatch::Dispatcher;

#[derive(Clone)]
pub struct VolcengineProviderData {
    pub client: Client,
    pub dispatcher: Dispatcher,
}

impl VolcengineProviderData {
    /// The dispatcher issues calls through the same client the services read with
    pub fn new(client: Client) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(client.clone()));
        Self { client, dispatcher }
    }
}
