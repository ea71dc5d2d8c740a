//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod admin;
pub mod devices;
pub mod health;

use fleetgate_control::DeviceId;

use crate::error::ApiError;

/// Parse a device ID from a path segment.
///
/// A malformed ID cannot name a registered device, so it is reported as
/// not found.
pub(crate) fn parse_device_id(raw: &str) -> Result<DeviceId, ApiError> {
    DeviceId::new(raw).map_err(|_| ApiError::NotFound(format!("device {raw}")))
}
