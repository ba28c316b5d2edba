//! Plugin supervisor — lifecycle, failure isolation, command routing.
//!
//! Each plugin is an independently supervised unit. Lifecycle transitions
//! for one plugin are serialized behind that plugin's own lock, while
//! different plugins transition concurrently. A hook failure marks its
//! plugin `Failed` and is logged; it never propagates to other plugins or
//! the hub. Every transition is announced as a `plugin.{id}.status` event
//! carrying the previous state.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};

use hearth_domain::device::{CommandResult, DeviceCommand};
use hearth_domain::error::{
    DescriptorError, HubError, NotFoundError, PluginLifecycleError, UnavailableError,
};
use hearth_domain::event::{Event, EventType};
use hearth_domain::id::{DeviceId, PluginId};
use hearth_domain::plugin::{PluginDescriptor, PluginKind, PluginState};
use hearth_domain::routing::Pattern;

use crate::event_bus::EventBus;
use crate::ports::{CommandDispatcher, EventPublisher, Plugin, PluginFactory};
use crate::state_store::DeviceStateStore;

/// Default deadline for a plugin's `stop` hook.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

const COMMAND_PATTERN: &str = "device.*.command";

struct PluginEntry {
    descriptor: RwLock<PluginDescriptor>,
    state: RwLock<PluginState>,
    // Serializes lifecycle hooks and command execution per plugin.
    plugin: Mutex<Box<dyn Plugin>>,
    // Ids this plugin has already announced; re-discovery stays silent.
    announced: RwLock<HashSet<DeviceId>>,
}

impl PluginEntry {
    fn state(&self) -> PluginState {
        *self.state.read().expect("plugin state poisoned")
    }

    fn kind(&self) -> PluginKind {
        self.descriptor.read().expect("plugin descriptor poisoned").kind
    }
}

/// Serializable status summary of one supervised plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginStatus {
    pub id: PluginId,
    pub kind: PluginKind,
    pub state: PluginState,
    pub device_count: usize,
}

/// Owns every plugin instance and routes device commands to them.
pub struct PluginSupervisor {
    plugins: DashMap<PluginId, Arc<PluginEntry>>,
    /// Which plugin announced each device.
    ownership: DashMap<DeviceId, PluginId>,
    bus: Arc<EventBus>,
    store: Arc<DeviceStateStore>,
    factory: Arc<dyn PluginFactory>,
    stop_timeout: Duration,
}

impl PluginSupervisor {
    #[must_use]
    pub fn new(
        bus: Arc<EventBus>,
        store: Arc<DeviceStateStore>,
        factory: Arc<dyn PluginFactory>,
    ) -> Self {
        Self {
            plugins: DashMap::new(),
            ownership: DashMap::new(),
            bus,
            store,
            factory,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Register a plugin from its descriptor.
    ///
    /// Disabled descriptors are skipped. The instance is built immediately
    /// but no lifecycle hook runs until [`Self::start_plugin`].
    ///
    /// # Errors
    ///
    /// Descriptor validation failures, duplicate ids, and unknown module
    /// references are reported; nothing is registered in those cases.
    pub async fn register(&self, descriptor: PluginDescriptor) -> Result<(), HubError> {
        descriptor.validate()?;
        if !descriptor.enabled {
            tracing::info!(plugin = %descriptor.id, "plugin disabled, skipping registration");
            return Ok(());
        }
        if self.plugins.contains_key(&descriptor.id) {
            return Err(DescriptorError::DuplicateId {
                id: descriptor.id.to_string(),
            }
            .into());
        }
        let plugin = self.factory.build(&descriptor).await?;
        let id = descriptor.id.clone();
        self.plugins.insert(
            id.clone(),
            Arc::new(PluginEntry {
                descriptor: RwLock::new(descriptor),
                state: RwLock::new(PluginState::Registered),
                plugin: Mutex::new(plugin),
                announced: RwLock::new(HashSet::new()),
            }),
        );
        tracing::info!(plugin = %id, "plugin registered");
        Ok(())
    }

    /// Initialize and start one plugin, then run its first discovery.
    ///
    /// A hook failure marks the plugin `Failed` and is returned; other
    /// plugins are unaffected either way.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown ids, [`HubError::Unavailable`]
    /// when the plugin is not startable from its current state, and
    /// [`HubError::Lifecycle`] when a hook fails.
    pub async fn start_plugin(&self, id: &PluginId) -> Result<(), HubError> {
        let entry = self.entry(id)?;
        let mut plugin = entry.plugin.lock().await;

        match entry.state() {
            PluginState::Registered | PluginState::Stopped => {}
            state => {
                return Err(UnavailableError {
                    plugin_id: id.to_string(),
                    state: state.to_string(),
                }
                .into());
            }
        }

        self.transition(id, &entry, PluginState::Initializing).await;
        if let Err(err) = plugin.initialize().await {
            return Err(self.fail(id, &entry, "initialize", &err).await);
        }
        if let Err(err) = plugin.start().await {
            return Err(self.fail(id, &entry, "start", &err).await);
        }
        self.transition(id, &entry, PluginState::Running).await;

        self.run_discovery(id, &entry, plugin.as_mut()).await;
        Ok(())
    }

    /// Stop one plugin, bounded by the stop timeout.
    ///
    /// Cleanup is best-effort: a failing or overrunning `stop` hook is
    /// logged and the plugin still lands in `Stopped`.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown ids; [`HubError::Unavailable`]
    /// when the plugin is not running.
    pub async fn stop_plugin(&self, id: &PluginId) -> Result<(), HubError> {
        let entry = self.entry(id)?;
        let mut plugin = entry.plugin.lock().await;

        if !entry.state().is_running() {
            return Err(UnavailableError {
                plugin_id: id.to_string(),
                state: entry.state().to_string(),
            }
            .into());
        }

        self.transition(id, &entry, PluginState::Stopping).await;
        match tokio::time::timeout(self.stop_timeout, plugin.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(plugin = %id, %err, "stop hook failed, marking stopped anyway");
            }
            Err(_) => {
                tracing::warn!(
                    plugin = %id,
                    timeout = ?self.stop_timeout,
                    "stop hook overran its deadline"
                );
            }
        }
        self.transition(id, &entry, PluginState::Stopped).await;
        Ok(())
    }

    /// Start every registered plugin concurrently.
    ///
    /// Failures are logged per plugin; one plugin failing never prevents
    /// the others from starting.
    pub async fn start_all(self: &Arc<Self>) {
        self.for_each_plugin(|supervisor, id| async move {
            if let Err(err) = supervisor.start_plugin(&id).await {
                tracing::error!(plugin = %id, %err, "plugin failed to start");
            }
        })
        .await;
    }

    /// Stop every running plugin concurrently.
    pub async fn stop_all(self: &Arc<Self>) {
        self.for_each_plugin(|supervisor, id| async move {
            match supervisor.stop_plugin(&id).await {
                Ok(()) | Err(HubError::Unavailable(_)) => {}
                Err(err) => tracing::error!(plugin = %id, %err, "plugin failed to stop"),
            }
        })
        .await;
    }

    async fn for_each_plugin<F, Fut>(self: &Arc<Self>, action: F)
    where
        F: Fn(Arc<Self>, PluginId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ids: Vec<PluginId> = self.plugins.iter().map(|e| e.key().clone()).collect();
        let mut tasks = JoinSet::new();
        for id in ids {
            tasks.spawn(action(Arc::clone(self), id));
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Reload a plugin with a (possibly updated) descriptor.
    ///
    /// The running instance is stopped and replaced by a freshly built one,
    /// which picks up the new configuration. Reloading with a disabled
    /// descriptor removes the plugin entirely.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown ids; [`HubError::Unavailable`]
    /// unless the plugin is `Running` or `Failed`; build and start errors
    /// are propagated.
    pub async fn reload(&self, descriptor: PluginDescriptor) -> Result<(), HubError> {
        descriptor.validate()?;
        let id = descriptor.id.clone();
        let entry = self.entry(&id)?;

        if !entry.state().can_reload() {
            return Err(UnavailableError {
                plugin_id: id.to_string(),
                state: entry.state().to_string(),
            }
            .into());
        }
        if entry.state().is_running() {
            self.stop_plugin(&id).await?;
        }

        if !descriptor.enabled {
            self.remove(&id).await;
            return Ok(());
        }

        let fresh = self.factory.build(&descriptor).await?;
        {
            let mut plugin = entry.plugin.lock().await;
            *plugin = fresh;
            *entry.descriptor.write().expect("plugin descriptor poisoned") = descriptor;
            *entry.state.write().expect("plugin state poisoned") = PluginState::Registered;
        }
        tracing::info!(plugin = %id, "plugin reloaded");
        self.start_plugin(&id).await
    }

    /// Reload a plugin from its stored descriptor (a plain restart).
    ///
    /// # Errors
    ///
    /// Same as [`Self::reload`].
    pub async fn reload_by_id(&self, id: &PluginId) -> Result<(), HubError> {
        let descriptor = self
            .entry(id)?
            .descriptor
            .read()
            .expect("plugin descriptor poisoned")
            .clone();
        self.reload(descriptor).await
    }

    async fn remove(&self, id: &PluginId) {
        self.plugins.remove(id);
        self.ownership.retain(|_, owner| owner != id);
        if let Err(err) = self
            .bus
            .publish_plugin_status(id, "removed", serde_json::json!({}))
            .await
        {
            tracing::warn!(plugin = %id, %err, "failed to publish removal status");
        }
        tracing::info!(plugin = %id, "plugin removed");
    }

    /// Re-run discovery for one running plugin.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown ids; [`HubError::Unavailable`]
    /// when the plugin is not running.
    pub async fn discover(&self, id: &PluginId) -> Result<(), HubError> {
        let entry = self.entry(id)?;
        let mut plugin = entry.plugin.lock().await;
        if !entry.state().is_running() {
            return Err(UnavailableError {
                plugin_id: id.to_string(),
                state: entry.state().to_string(),
            }
            .into());
        }
        self.run_discovery(id, &entry, plugin.as_mut()).await;
        Ok(())
    }

    // Discovery is idempotent: a device id is announced on the bus exactly
    // once per plugin lifetime; later reports only refresh stored info.
    async fn run_discovery(&self, id: &PluginId, entry: &PluginEntry, plugin: &mut dyn Plugin) {
        let devices = match plugin.discover().await {
            Ok(devices) => devices,
            Err(err) => {
                tracing::warn!(plugin = %id, %err, "discovery failed");
                return;
            }
        };
        for info in devices {
            let device_id = info.id.clone();
            self.ownership.insert(device_id.clone(), id.clone());
            let newly_known = self.store.merge_discovered(info.clone());
            let first_announcement = entry
                .announced
                .write()
                .expect("announced set poisoned")
                .insert(device_id.clone());
            if newly_known && first_announcement {
                let event = Event::device_discovery(
                    device_id.clone(),
                    serde_json::json!({ "device": info, "plugin_id": id }),
                );
                if let Err(err) = self.bus.publish(event).await {
                    tracing::warn!(device = %device_id, %err, "failed to publish discovery");
                }
            }
        }
    }

    /// Status summary for every supervised plugin.
    #[must_use]
    pub fn plugin_statuses(&self) -> Vec<PluginStatus> {
        self.plugins
            .iter()
            .map(|entry| {
                let id = entry.key().clone();
                let device_count = self.ownership.iter().filter(|o| *o.value() == id).count();
                PluginStatus {
                    kind: entry.kind(),
                    state: entry.state(),
                    device_count,
                    id,
                }
            })
            .collect()
    }

    /// Current lifecycle state of one plugin.
    #[must_use]
    pub fn plugin_state(&self, id: &PluginId) -> Option<PluginState> {
        self.plugins.get(id).map(|entry| entry.state())
    }

    /// Health snapshot of one plugin, as reported by the plugin itself.
    ///
    /// # Errors
    ///
    /// [`HubError::NotFound`] for unknown ids.
    pub async fn health_check(&self, id: &PluginId) -> Result<serde_json::Value, HubError> {
        let entry = self.entry(id)?;
        let plugin = entry.plugin.lock().await;
        let mut report = plugin.health_check().await;
        if let Some(map) = report.as_object_mut() {
            map.insert("state".to_string(), serde_json::json!(entry.state()));
        }
        Ok(report)
    }

    /// Spawn the bus consumer serving `device.*.command` events.
    ///
    /// Dispatch failures for bus-borne commands have no caller to report
    /// to, so they are published as `device.{id}.error` events instead.
    #[must_use]
    pub fn run(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let pattern = Pattern::compile(COMMAND_PATTERN).expect("literal pattern compiles");
        let (_, mut receiver) = bus.subscribe(pattern);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                self.serve_command_event(&event).await;
            }
        })
    }

    async fn serve_command_event(&self, event: &Event) {
        if event.event_type != EventType::Command {
            return;
        }
        let Some(device_id) = &event.device_id else {
            tracing::warn!(routing_key = %event.routing_key, "command event without device id");
            return;
        };
        let command: DeviceCommand = match serde_json::from_value(event.payload.clone()) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(device = %device_id, %err, "malformed command payload dropped");
                return;
            }
        };
        if let Err(err) = self.dispatch(device_id, command).await {
            tracing::warn!(device = %device_id, %err, "bus command failed");
            if let Err(publish_err) = self
                .bus
                .publish_device_error(device_id.clone(), &err.to_string())
                .await
            {
                tracing::warn!(device = %device_id, %publish_err, "failed to publish device error");
            }
        }
    }

    fn entry(&self, id: &PluginId) -> Result<Arc<PluginEntry>, HubError> {
        self.plugins
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Plugin",
                    id: id.to_string(),
                }
                .into()
            })
    }

    async fn transition(&self, id: &PluginId, entry: &PluginEntry, next: PluginState) {
        let previous = {
            let mut state = entry.state.write().expect("plugin state poisoned");
            std::mem::replace(&mut *state, next)
        };
        tracing::info!(plugin = %id, from = %previous, to = %next, "plugin state changed");
        let details = serde_json::json!({ "previous_state": previous });
        if let Err(err) = self.bus.publish_plugin_status(id, next.as_str(), details).await {
            tracing::warn!(plugin = %id, %err, "failed to publish status event");
        }
    }

    async fn fail(
        &self,
        id: &PluginId,
        entry: &PluginEntry,
        hook: &'static str,
        cause: &HubError,
    ) -> HubError {
        tracing::error!(plugin = %id, %hook, %cause, "plugin hook failed");
        self.transition(id, entry, PluginState::Failed).await;
        PluginLifecycleError {
            plugin_id: id.to_string(),
            hook,
            message: cause.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl CommandDispatcher for PluginSupervisor {
    async fn dispatch(
        &self,
        device_id: &DeviceId,
        command: DeviceCommand,
    ) -> Result<CommandResult, HubError> {
        let plugin_id = self
            .ownership
            .get(device_id)
            .map(|owner| owner.clone())
            .ok_or_else(|| NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            })?;
        let entry = self.entry(&plugin_id)?;
        if !entry.state().is_running() {
            return Err(UnavailableError {
                plugin_id: plugin_id.to_string(),
                state: entry.state().to_string(),
            }
            .into());
        }
        let plugin = entry.plugin.lock().await;
        plugin.execute_command(device_id, &command).await
    }
}
