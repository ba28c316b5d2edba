//! Event bus port — publishing domain events.
//!
//! The trait is dyn-safe so plugins can hold an `Arc<dyn EventPublisher>`
//! without knowing the concrete bus. The provided methods cover the
//! routing-key namespace so call sites never assemble keys by hand.

use std::sync::Arc;

use async_trait::async_trait;

use hearth_domain::error::HubError;
use hearth_domain::event::Event;
use hearth_domain::id::{DeviceId, PluginId};

/// Publishes events to interested subscribers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all current subscribers.
    ///
    /// # Errors
    ///
    /// Implementations report transport failures; the in-process bus never
    /// fails.
    async fn publish(&self, event: Event) -> Result<(), HubError>;

    /// Publish a `device.{id}.state` event carrying the full device state.
    async fn publish_device_state(
        &self,
        device_id: DeviceId,
        state: serde_json::Value,
    ) -> Result<(), HubError> {
        self.publish(Event::device_state(device_id, state)).await
    }

    /// Publish a `device.{id}.available` event.
    async fn publish_device_available(
        &self,
        device_id: DeviceId,
        available: bool,
    ) -> Result<(), HubError> {
        self.publish(Event::device_available(device_id, available))
            .await
    }

    /// Publish a `device.{id}.error` event.
    async fn publish_device_error(
        &self,
        device_id: DeviceId,
        message: &str,
    ) -> Result<(), HubError> {
        self.publish(Event::device_error(device_id, message)).await
    }

    /// Publish a `plugin.{id}.status` event.
    async fn publish_plugin_status(
        &self,
        plugin_id: &PluginId,
        status: &str,
        details: serde_json::Value,
    ) -> Result<(), HubError> {
        self.publish(Event::plugin_status(plugin_id, status, details))
            .await
    }

    /// Publish a `system.{event_type}` event.
    async fn publish_system(
        &self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), HubError> {
        self.publish(Event::system(event_type, data)).await
    }
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, event: Event) -> Result<(), HubError> {
        (**self).publish(event).await
    }
}
