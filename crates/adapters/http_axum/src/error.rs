//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use hearth_domain::error::HubError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`HubError`] to an HTTP response with appropriate status code.
pub struct ApiError(HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            HubError::InvalidPattern(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            HubError::Descriptor(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            HubError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            HubError::Unavailable(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            HubError::Command(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            HubError::Timeout(err) => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
            HubError::Lifecycle(err) => {
                tracing::error!(error = %err, "lifecycle error surfaced to the API");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
