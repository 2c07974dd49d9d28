//! Read-only HTTP endpoints: service info, relay status and health.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http::StatusCode;
use serde::Serialize;

use crate::adapters::websocket::{RelayClosed, RelayHandle, RelayStatus};

/// State for the status endpoints.
#[derive(Clone)]
pub struct StatusAppState {
    pub relay: RelayHandle,
}

/// `GET /` body.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RelayClosed {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec!["GET /", "GET /status", "GET /health", "GET /ws (websocket)"],
    })
}

/// Current producer, consumer count and latest telemetry.
pub async fn relay_status(
    State(state): State<StatusAppState>,
) -> Result<Json<RelayStatus>, RelayClosed> {
    let status = state.relay.status().await?;
    Ok(Json(status))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Create the status router.
///
/// # Routes
///
/// - `GET /` - Service name, version and endpoints
/// - `GET /status` - Relay snapshot
/// - `GET /health` - Liveness check
pub fn status_router() -> Router<StatusAppState> {
    Router::new()
        .route("/", get(service_info))
        .route("/status", get(relay_status))
        .route("/health", get(health))
}
