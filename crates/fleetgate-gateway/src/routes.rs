//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{any, get, patch, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use fleetgate_auth::IdentityValidator;
use fleetgate_control::DeviceControl;

use crate::handlers::{admin, devices, health};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Gateway health and fleet counts
///
/// ## Devices (authenticated)
/// - `GET /api/devices` - List devices without addresses
/// - `GET /api/devices/status` - Query `/status` on every device
/// - `ANY /api/devices/:id/proxy/*path` - Forward to one device
///   (non-admins: `GET` and `HEAD` only)
///
/// ## Admin
/// - `GET /api/admin/devices` - List full device records
/// - `POST /api/admin/devices` - Register a device
/// - `PATCH /api/admin/devices/:id` - Edit a device
/// - `DELETE /api/admin/devices/:id` - Remove a device
/// - `POST /api/admin/discovery` - Run a discovery sweep
/// - `POST /api/admin/health-check` - Run a health-check sweep
pub fn create_router<C, V>(state: GatewayState<C, V>) -> Router
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health::<C, V>))
        // Devices
        .route("/api/devices", get(devices::list_devices::<C, V>))
        .route("/api/devices/status", get(devices::bulk_status::<C, V>))
        .route(
            "/api/devices/:device_id/proxy/*path",
            any(devices::proxy::<C, V>),
        )
        // Admin
        .route(
            "/api/admin/devices",
            get(admin::list_devices::<C, V>).post(admin::add_device::<C, V>),
        )
        .route(
            "/api/admin/devices/:device_id",
            patch(admin::update_device::<C, V>).delete(admin::remove_device::<C, V>),
        )
        .route("/api/admin/discovery", post(admin::run_discovery::<C, V>))
        .route(
            "/api/admin/health-check",
            post(admin::run_health_check::<C, V>),
        )
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
