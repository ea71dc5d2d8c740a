//! Administrative endpoints.
//!
//! Every handler here takes an [`AdminUser`], so non-admin callers are
//! rejected with 403 before any work is done.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use fleetgate_auth::IdentityValidator;
use fleetgate_control::{AddDeviceRequest, Device, DeviceControl, UpdateDeviceRequest};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::handlers::parse_device_id;
use crate::state::GatewayState;

/// Full device records, addresses included.
#[derive(Debug, Serialize)]
pub struct AdminDevicesResponse {
    /// Devices in registration order.
    pub devices: Vec<Device>,
}

/// List full device records.
///
/// # Errors
///
/// Returns `Forbidden` for non-admin callers.
pub async fn list_devices<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let devices = state.control.list_devices().await;
    Ok(Json(AdminDevicesResponse { devices }))
}

/// Register a device.
///
/// # Errors
///
/// Returns `BadRequest` for a blank address or name and `Conflict` when the
/// ID or address is taken.
pub async fn add_device<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    AdminUser(admin): AdminUser,
    Json(body): Json<AddDeviceRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let device = state.control.add_device(body).await?;
    tracing::info!(admin = %admin.id, device_id = %device.id, "Device added");
    Ok((StatusCode::CREATED, Json(device)))
}

/// Edit a device.
///
/// # Errors
///
/// Returns `NotFound` for an unknown device.
pub async fn update_device<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    AdminUser(admin): AdminUser,
    Path(device_id): Path<String>,
    Json(body): Json<UpdateDeviceRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let device_id = parse_device_id(&device_id)?;
    let device = state.control.update_device(&device_id, body).await?;
    tracing::info!(admin = %admin.id, device_id = %device.id, "Device updated");
    Ok(Json(device))
}

/// Remove a device.
///
/// # Errors
///
/// Returns `NotFound` for an unknown device.
pub async fn remove_device<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    AdminUser(admin): AdminUser,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let device_id = parse_device_id(&device_id)?;
    state.control.remove_device(&device_id).await?;
    tracing::info!(admin = %admin.id, device_id = %device_id, "Device removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Run a discovery sweep and return its report.
///
/// # Errors
///
/// Returns `Forbidden` for non-admin callers.
pub async fn run_discovery<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    AdminUser(admin): AdminUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    tracing::info!(admin = %admin.id, "Discovery sweep requested");
    Ok(Json(state.control.run_discovery().await))
}

/// Run a health-check sweep and return its report.
///
/// # Errors
///
/// Returns `Forbidden` for non-admin callers.
pub async fn run_health_check<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    AdminUser(admin): AdminUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    tracing::info!(admin = %admin.id, "Health-check sweep requested");
    Ok(Json(state.control.run_health_check().await))
}
