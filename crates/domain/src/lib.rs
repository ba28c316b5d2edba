//! # hearth-domain
//!
//! Pure domain model for the hearth home automation hub.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps
//! - Define **routing keys** and subscription **patterns** (`*`/`#` wildcards)
//! - Define **Events** — the only currency exchanged between components
//! - Define **Devices** (info, state, records, commands)
//! - Define **Plugin descriptors** and the plugin lifecycle state machine
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod event;
pub mod plugin;
pub mod routing;
