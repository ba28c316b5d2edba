//! Maps descriptor module references to concrete plugin implementations.

use std::sync::Arc;

use async_trait::async_trait;

use hearth_app::ports::{EventPublisher, Plugin, PluginFactory};
use hearth_domain::error::{HubError, NotFoundError};
use hearth_domain::plugin::PluginDescriptor;

use hearth_adapter_virtual::VirtualPlugin;

/// The daemon's plugin factory.
///
/// Every plugin gets the shared event publisher injected, so state and
/// availability changes land on the bus regardless of which module
/// produced them.
pub struct HubPluginFactory {
    publisher: Arc<dyn EventPublisher>,
}

impl HubPluginFactory {
    #[must_use]
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl PluginFactory for HubPluginFactory {
    async fn build(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn Plugin>, HubError> {
        match descriptor.module.as_str() {
            "virtual" => Ok(Box::new(VirtualPlugin::new(
                descriptor.id.clone(),
                descriptor.config.clone(),
                Arc::clone(&self.publisher),
            ))),
            module => Err(NotFoundError {
                entity: "Plugin module",
                id: module.to_string(),
            }
            .into()),
        }
    }
}
