//! Device-state store — last-known state, kept consistent through events.
//!
//! The store owns the only mutable map of device records. Mutation happens
//! in exactly two places: [`DeviceStateStore::apply_event`] (driven by the
//! bus consumer) and [`DeviceStateStore::merge_discovered`] (the
//! supervisor's discovery path). Every read returns a clone, so callers can
//! never corrupt a record or race a concurrent writer. Records are keyed by
//! device id; writes to different ids do not contend.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use hearth_domain::device::{DeviceCommand, DeviceRecord, DeviceState, DeviceType};
use hearth_domain::error::{HubError, NotFoundError, TimeoutError};
use hearth_domain::event::{Event, EventType};
use hearth_domain::id::{DeviceId, PluginId};
use hearth_domain::routing::Pattern;

use crate::event_bus::EventBus;
use crate::ports::CommandDispatcher;

/// Optional criteria for [`DeviceStateStore::snapshot_all`].
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub device_type: Option<DeviceType>,
    pub plugin_id: Option<PluginId>,
    pub room: Option<String>,
    pub online: Option<bool>,
}

impl DeviceFilter {
    fn accepts(&self, record: &DeviceRecord) -> bool {
        if let Some(device_type) = self.device_type {
            if record.info.device_type != device_type {
                return false;
            }
        }
        if let Some(plugin_id) = &self.plugin_id {
            if record.info.plugin_id != *plugin_id {
                return false;
            }
        }
        if let Some(room) = &self.room {
            if record.info.room.as_deref() != Some(room.as_str()) {
                return false;
            }
        }
        if let Some(online) = self.online {
            if record.state.online != online {
                return false;
            }
        }
        true
    }
}

/// Keyed cache of last-known device state.
pub struct DeviceStateStore {
    records: DashMap<DeviceId, DeviceRecord>,
    // Fires the device id after each applied state event; await_refresh
    // listens on this.
    changes: broadcast::Sender<DeviceId>,
}

impl Default for DeviceStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStateStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            records: DashMap::new(),
            changes,
        }
    }

    /// Spawn the bus consumer task feeding [`Self::apply_event`].
    pub fn run(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let (_, mut receiver) = bus.subscribe(Pattern::catch_all());
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                self.apply_event(&event);
            }
        })
    }

    /// Insert or refresh a record for a discovered device.
    ///
    /// Returns `true` when the device was previously unknown. Re-discovery
    /// refreshes `info` in place — never a duplicate record, and the caller
    /// must not re-announce the device.
    pub fn merge_discovered(&self, info: hearth_domain::device::DeviceInfo) -> bool {
        match self.records.entry(info.id.clone()) {
            dashmap::Entry::Occupied(mut occupied) => {
                occupied.get_mut().refresh_info(info);
                false
            }
            dashmap::Entry::Vacant(vacant) => {
                vacant.insert(DeviceRecord::new(info));
                true
            }
        }
    }

    /// Fold one bus event into the cache.
    ///
    /// `state` and `available` events require an existing record; events
    /// for unknown devices are logged and dropped rather than creating a
    /// partial record. Malformed payloads are likewise dropped.
    pub fn apply_event(&self, event: &Event) {
        match event.event_type {
            EventType::State => self.apply_state(event),
            EventType::Available => self.apply_available(event),
            EventType::Discovery => self.apply_discovery(event),
            _ => {}
        }
    }

    fn apply_state(&self, event: &Event) {
        let Some(device_id) = &event.device_id else {
            tracing::warn!(routing_key = %event.routing_key, "state event without device id");
            return;
        };
        let state: DeviceState = match serde_json::from_value(event.payload.clone()) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(device = %device_id, %err, "malformed state payload dropped");
                return;
            }
        };
        let Some(mut record) = self.records.get_mut(device_id) else {
            tracing::warn!(device = %device_id, "state event for unknown device dropped");
            return;
        };
        record.update_state(state);
        drop(record);
        let _ = self.changes.send(device_id.clone());
    }

    fn apply_available(&self, event: &Event) {
        let Some(device_id) = &event.device_id else {
            tracing::warn!(routing_key = %event.routing_key, "available event without device id");
            return;
        };
        let Some(available) = event.payload.get("available").and_then(|v| v.as_bool()) else {
            tracing::warn!(device = %device_id, "malformed available payload dropped");
            return;
        };
        let Some(mut record) = self.records.get_mut(device_id) else {
            tracing::warn!(device = %device_id, "available event for unknown device dropped");
            return;
        };
        record.set_available(available);
    }

    fn apply_discovery(&self, event: &Event) {
        let Some(device) = event.payload.get("device") else {
            tracing::warn!(routing_key = %event.routing_key, "discovery event without device info");
            return;
        };
        match serde_json::from_value(device.clone()) {
            Ok(info) => {
                self.merge_discovered(info);
            }
            Err(err) => {
                tracing::warn!(%err, "malformed discovery payload dropped");
            }
        }
    }

    /// Copy of the record for `device_id`, if known.
    #[must_use]
    pub fn snapshot(&self, device_id: &DeviceId) -> Option<DeviceRecord> {
        self.records.get(device_id).map(|r| r.clone())
    }

    /// Copies of all records accepted by `filter`.
    #[must_use]
    pub fn snapshot_all(&self, filter: &DeviceFilter) -> Vec<DeviceRecord> {
        self.records
            .iter()
            .filter(|r| filter.accepts(r))
            .map(|r| r.clone())
            .collect()
    }

    /// Number of known devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no device has been discovered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wait for the next applied `state` event for `device_id`.
    ///
    /// # Errors
    ///
    /// [`HubError::Timeout`] when no state event arrives in time.
    pub async fn await_state(
        &self,
        device_id: &DeviceId,
        timeout: Duration,
    ) -> Result<DeviceRecord, HubError> {
        let receiver = self.changes.subscribe();
        self.wait_for_change(receiver, device_id, timeout).await
    }

    /// Issue a `refresh` command through `dispatcher`, then wait for the
    /// next state event for `device_id`.
    ///
    /// # Errors
    ///
    /// Propagates dispatch errors; [`HubError::Timeout`] when the refreshed
    /// state does not arrive in time.
    pub async fn await_refresh(
        &self,
        dispatcher: &dyn CommandDispatcher,
        device_id: &DeviceId,
        timeout: Duration,
    ) -> Result<DeviceRecord, HubError> {
        // Subscribe before dispatching so the confirmation cannot slip past.
        let receiver = self.changes.subscribe();
        dispatcher
            .dispatch(device_id, DeviceCommand::new("refresh"))
            .await?;
        self.wait_for_change(receiver, device_id, timeout).await
    }

    async fn wait_for_change(
        &self,
        mut receiver: broadcast::Receiver<DeviceId>,
        device_id: &DeviceId,
        timeout: Duration,
    ) -> Result<DeviceRecord, HubError> {
        let wait = async {
            loop {
                match receiver.recv().await {
                    Ok(changed) if changed == *device_id => return true,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(true) => self.snapshot(device_id).ok_or_else(|| {
                NotFoundError {
                    entity: "Device",
                    id: device_id.to_string(),
                }
                .into()
            }),
            Ok(false) | Err(_) => Err(TimeoutError {
                operation: format!("state event for device {device_id}"),
                timeout,
            }
            .into()),
        }
    }
}
