//! # hearth-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the JSON API for devices and plugins
//!   (`/api/devices`, `/api/plugins`, …)
//! - Serve the server-sent event stream (`/api/events/stream`) backed by
//!   the stream bridge
//! - Map HTTP requests into supervisor/store calls (driving adapter)
//! - Map [`HubError`](hearth_domain::error::HubError) values into HTTP
//!   status codes
//!
//! ## Dependency rule
//! Depends on `hearth-app` (supervisor, store, bridge) and `hearth-domain`
//! (types used in request/response mapping). Never leaks axum types into
//! the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
