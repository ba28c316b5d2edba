//! JSON REST handlers for devices.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use hearth_app::ports::CommandDispatcher;
use hearth_app::state_store::DeviceFilter;
use hearth_domain::device::{CommandResult, DeviceCommand, DeviceRecord, DeviceState, DeviceType};
use hearth_domain::error::{HubError, NotFoundError};
use hearth_domain::id::{DeviceId, PluginId};

use crate::error::ApiError;
use crate::state::AppState;

/// How long a refresh waits for the device to report back.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameters for the list endpoint.
#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    pub plugin_id: Option<String>,
    pub room: Option<String>,
    pub online: Option<bool>,
}

impl From<ListQuery> for DeviceFilter {
    fn from(query: ListQuery) -> Self {
        Self {
            device_type: query.device_type,
            plugin_id: query.plugin_id.map(PluginId::from),
            room: query.room,
            online: query.online,
        }
    }
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<DeviceRecord>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get and refresh endpoints.
pub enum GetResponse {
    Ok(Json<DeviceRecord>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the state endpoint.
pub enum StateResponse {
    Ok(Json<DeviceState>),
}

impl IntoResponse for StateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the command endpoint.
pub enum CommandResponse {
    Ok(Json<CommandResult>),
}

impl IntoResponse for CommandResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/devices`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ListResponse, ApiError> {
    let records = state.store.snapshot_all(&query.into());
    Ok(ListResponse::Ok(Json(records)))
}

/// `GET /api/devices/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError> {
    let device_id = DeviceId::from(id);
    let record = state.store.snapshot(&device_id).ok_or_else(|| {
        HubError::from(NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        })
    })?;
    Ok(GetResponse::Ok(Json(record)))
}

/// `GET /api/devices/{id}/state`
pub async fn state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StateResponse, ApiError> {
    let device_id = DeviceId::from(id);
    let record = state.store.snapshot(&device_id).ok_or_else(|| {
        HubError::from(NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        })
    })?;
    Ok(StateResponse::Ok(Json(record.state)))
}

/// `POST /api/devices/{id}/command`
pub async fn command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(command): Json<DeviceCommand>,
) -> Result<CommandResponse, ApiError> {
    let device_id = DeviceId::from(id);
    let result = state.supervisor.dispatch(&device_id, command).await?;
    Ok(CommandResponse::Ok(Json(result)))
}

/// `POST /api/devices/{id}/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError> {
    let device_id = DeviceId::from(id);
    let record = state
        .store
        .await_refresh(state.supervisor.as_ref(), &device_id, REFRESH_TIMEOUT)
        .await?;
    Ok(GetResponse::Ok(Json(record)))
}
