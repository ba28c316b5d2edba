//! Port definitions — traits at the boundaries of the application core.
//!
//! Ports are defined here so the core and the adapter layer can depend on
//! them without creating circular dependencies.

pub mod dispatcher;
pub mod event_bus;
pub mod plugin;

pub use dispatcher::CommandDispatcher;
pub use event_bus::EventPublisher;
pub use plugin::{Plugin, PluginFactory};
