use axum::{Json, http::StatusCode};
use cookiepress_api_types::MessageResponse;

/// Smoke-test endpoint confirming the service is deployed.
pub(super) async fn hello() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello from cookiepress".to_string(),
    })
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
