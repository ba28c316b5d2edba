//! # hearth-app
//!
//! Application core — the event distribution and plugin supervision layer.
//!
//! ## Responsibilities
//! - **`EventBus`** — in-process pattern-matched publish/subscribe; the unit
//!   every other component depends on
//! - **`PluginSupervisor`** — drives each plugin through its lifecycle state
//!   machine, isolates failures per plugin, routes discovery and commands
//! - **`DeviceStateStore`** — last-known device state, mutated only by
//!   consuming bus events, read through copy-returning snapshots
//! - **`StreamBridge`** — fans the event stream out to independent client
//!   sessions with bounded drop-oldest queues and periodic heartbeats
//! - **Port traits** that adapters implement or consume:
//!   [`EventPublisher`](ports::EventPublisher), [`Plugin`](ports::Plugin),
//!   [`PluginFactory`](ports::PluginFactory),
//!   [`CommandDispatcher`](ports::CommandDispatcher)
//!
//! ## Dependency rule
//! Depends on `hearth-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod event_bus;
pub mod ports;
pub mod state_store;
pub mod stream_bridge;
pub mod supervisor;
