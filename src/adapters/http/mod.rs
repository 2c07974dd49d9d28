//! HTTP adapters - the application router.
//!
//! Combines the read-only status endpoints with the WebSocket endpoint and
//! wraps them in request tracing and CORS.

pub mod status;

pub use status::{status_router, StatusAppState};

use axum::Router;
use http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{websocket_router, RelayHandle, WebSocketState};
use crate::config::ServerConfig;

/// Build the full application router around a running relay.
pub fn app_router(relay: RelayHandle, server: &ServerConfig) -> Router {
    Router::new()
        .merge(status_router().with_state(StatusAppState {
            relay: relay.clone(),
        }))
        .merge(websocket_router().with_state(WebSocketState::new(relay)))
        .layer(cors_layer(server))
        .layer(TraceLayer::new_for_http())
}

/// Permissive when no origins are configured, otherwise an explicit list.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    }
}
