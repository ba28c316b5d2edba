//! JSON REST handlers for plugins.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use hearth_app::supervisor::PluginStatus;
use hearth_domain::id::PluginId;
use hearth_domain::plugin::PluginDescriptor;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<PluginStatus>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the health endpoint.
pub enum HealthResponse {
    Ok(Json<serde_json::Value>),
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the reload endpoint.
pub enum ReloadResponse {
    NoContent,
}

impl IntoResponse for ReloadResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/plugins`
pub async fn list(State(state): State<AppState>) -> Result<ListResponse, ApiError> {
    Ok(ListResponse::Ok(Json(state.supervisor.plugin_statuses())))
}

/// `GET /api/plugins/{id}/health`
pub async fn health(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<HealthResponse, ApiError> {
    let report = state.supervisor.health_check(&PluginId::from(id)).await?;
    Ok(HealthResponse::Ok(Json(report)))
}

/// `POST /api/plugins/reload`
///
/// Stops the running instance, rebuilds it from the submitted descriptor,
/// and starts it. A disabled descriptor removes the plugin.
pub async fn reload(
    State(state): State<AppState>,
    Json(descriptor): Json<PluginDescriptor>,
) -> Result<ReloadResponse, ApiError> {
    state.supervisor.reload(descriptor).await?;
    Ok(ReloadResponse::NoContent)
}

/// `POST /api/plugins/{id}/reload`
///
/// Restarts the plugin from its current descriptor.
pub async fn reload_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ReloadResponse, ApiError> {
    state.supervisor.reload_by_id(&PluginId::from(id)).await?;
    Ok(ReloadResponse::NoContent)
}
