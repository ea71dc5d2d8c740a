//! Device endpoints open to every authenticated caller.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use fleetgate_auth::IdentityValidator;
use fleetgate_control::{DeviceControl, DeviceSummary, ForwardOutcome, ForwardRequest};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::parse_device_id;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Response for the public device listing.
#[derive(Debug, Serialize)]
pub struct ListDevicesResponse {
    /// Devices in registration order.
    pub devices: Vec<DeviceSummary>,
}

/// Response for the bulk status query.
#[derive(Debug, Serialize)]
pub struct BulkStatusResponse {
    /// One outcome per device.
    pub results: Vec<ForwardOutcome>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List devices without their network addresses.
///
/// # Errors
///
/// Returns `Unauthorized` without a valid token.
pub async fn list_devices<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let devices = state.control.list_devices().await;

    let response = ListDevicesResponse {
        devices: devices.iter().map(DeviceSummary::from).collect(),
    };

    Ok(Json(response))
}

/// Query `/status` on every device.
///
/// Always 200; per-device failures are reported inside the results.
///
/// # Errors
///
/// Returns `Unauthorized` without a valid token.
pub async fn bulk_status<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let results = state.control.forward_all_status().await;
    Ok(Json(BulkStatusResponse { results }))
}

/// Forward the request to a device and relay its answer.
///
/// The method, remaining path, query string and JSON body are passed on
/// as-is. A completed exchange answers 200 with the outcome, whatever status
/// the device returned; a transport failure answers 502 with the outcome.
///
/// # Errors
///
/// Returns `Forbidden` for a mutating method from a non-admin, `NotFound`
/// for an unknown device, and `BadRequest` for a non-JSON body.
pub async fn proxy<C, V>(
    State(state): State<Arc<GatewayState<C, V>>>,
    user: AuthUser,
    method: Method,
    Path((device_id, path)): Path<(String, String)>,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError>
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    user.authorize_forward(&method)?;
    let device_id = parse_device_id(&device_id)?;

    let mut target = format!("/{}", path.trim_start_matches('/'));
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut request = ForwardRequest::new(method, target);
    if let Some(body) = parse_body(&body)? {
        request = request.with_body(body);
    }

    tracing::debug!(
        user_id = %user.0.id,
        device_id = %device_id,
        method = %request.method,
        path = %request.path,
        "Proxying request"
    );

    let outcome = state.control.forward(&device_id, request).await?;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };

    Ok((status, Json(outcome)).into_response())
}

fn parse_body(body: &[u8]) -> Result<Option<Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("request body must be JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_is_absent() {
        assert_eq!(parse_body(b"").unwrap(), None);
        assert_eq!(parse_body(b"  \n").unwrap(), None);
    }

    #[test]
    fn json_body_is_parsed() {
        assert_eq!(
            parse_body(br#"{"brightness": 40}"#).unwrap(),
            Some(json!({"brightness": 40}))
        );
        assert!(matches!(
            parse_body(b"brightness=40"),
            Err(ApiError::BadRequest(_))
        ));
    }
}
