//! Health endpoint.
//!
//! Public. The gateway answers 200 whenever it is serving; the fleet counts
//! describe the registry as of the last observations and never fail the
//! check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use fleetgate_auth::IdentityValidator;
use fleetgate_control::{Device, DeviceControl, DeviceStatus};

use crate::state::GatewayState;

/// Health response.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "uptimeSeconds": 3600,
///   "devices": { "total": 3, "online": 2, "offline": 1, "pending": 0 }
/// }
/// ```
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Gateway status.
    pub status: &'static str,
    /// Gateway version.
    pub version: &'static str,
    /// Seconds since the gateway started.
    pub uptime_seconds: u64,
    /// Registry counts by status.
    pub devices: FleetCounts,
}

/// Registered devices by last known status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetCounts {
    /// Every registered device.
    pub total: usize,
    /// Answered the last observation.
    pub online: usize,
    /// Failed the last observation.
    pub offline: usize,
    /// Not observed since registration.
    pub pending: usize,
}

impl FleetCounts {
    /// Tally a device listing.
    #[must_use]
    pub fn tally(devices: &[Device]) -> Self {
        devices.iter().fold(Self::default(), |mut counts, device| {
            counts.total += 1;
            if device.is_online() {
                counts.online += 1;
            } else if device.status == DeviceStatus::Offline {
                counts.offline += 1;
            } else {
                counts.pending += 1;
            }
            counts
        })
    }
}

/// Health handler.
pub async fn health<C, V>(State(state): State<Arc<GatewayState<C, V>>>) -> impl IntoResponse
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    let devices = state.control.list_devices().await;
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
        devices: FleetCounts::tally(&devices),
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgate_control::{DeviceId, DeviceOrigin};

    fn device(address: &str, status: DeviceStatus) -> Device {
        let mut device = Device::new(
            DeviceId::from_address(address),
            address,
            address,
            DeviceOrigin::Manual,
        );
        device.status = status;
        device
    }

    #[test]
    fn tally_counts_each_status() {
        let devices = [
            device("10.0.0.1", DeviceStatus::Online),
            device("10.0.0.2", DeviceStatus::Online),
            device("10.0.0.3", DeviceStatus::Offline),
            device("10.0.0.4", DeviceStatus::Pending),
        ];

        assert_eq!(
            FleetCounts::tally(&devices),
            FleetCounts {
                total: 4,
                online: 2,
                offline: 1,
                pending: 1,
            }
        );
        assert_eq!(FleetCounts::tally(&[]), FleetCounts::default());
    }
}
