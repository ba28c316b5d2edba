//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod events;
#[allow(clippy::missing_errors_doc)]
pub mod plugins;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Devices
        .route("/devices", get(devices::list))
        .route("/devices/{id}", get(devices::get))
        .route("/devices/{id}/state", get(devices::state))
        .route("/devices/{id}/command", post(devices::command))
        .route("/devices/{id}/refresh", post(devices::refresh))
        // Plugins
        .route("/plugins", get(plugins::list))
        .route("/plugins/reload", post(plugins::reload))
        .route("/plugins/{id}/reload", post(plugins::reload_by_id))
        .route("/plugins/{id}/health", get(plugins::health))
        // Events
        .route("/events/stream", get(events::stream))
        .route("/events/devices/{id}/stream", get(events::device_stream))
}
