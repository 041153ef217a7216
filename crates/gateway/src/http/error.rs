//! HTTP error mapping. `GatewayError` lives in `gateway-common` (no `axum`
//! dependency there), so the `IntoResponse` impl lives in this crate on a
//! thin wrapper — the orphan-rule-friendly way to attach a foreign trait to
//! a foreign type (spec.md §7 "OpenAI-style error JSON with `error.type`").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use gateway_common::GatewayError;

pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": {
                "message": self.0.to_string(),
                "type": self.0.error_type(),
                "code": self.0.error_type(),
            }
        });
        (status, Json(body)).into_response()
    }
}
