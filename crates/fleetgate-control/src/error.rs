//! Error types for the control layer.
//!
//! [`ControlError`] is returned to callers of registry and forwarding
//! operations. [`DeviceError`] describes a failed exchange with a device and
//! is never surfaced as a `ControlError`: it is folded into probe and forward
//! outcomes instead.

use fleetgate_core::{DeviceId, IdError};
use serde::Serialize;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested device was not found.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// A device with this ID is already registered.
    #[error("device already registered: {0}")]
    DuplicateDevice(DeviceId),

    /// The address is already registered to another device.
    #[error("address {address} is already registered to device {device_id}")]
    AddressInUse {
        /// The contested address.
        address: String,
        /// The device currently using it.
        device_id: DeviceId,
    },

    /// The request failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An explicitly assigned device ID is malformed.
    #[error("invalid device id: {0}")]
    InvalidId(#[from] IdError),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] fleetgate_store::StoreError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::DeviceNotFound(_) => 404,
            Self::DuplicateDevice(_) | Self::AddressInUse { .. } => 409,
            Self::InvalidRequest(_) | Self::InvalidId(_) => 400,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<fleetgate_store::InsertConflict> for ControlError {
    fn from(conflict: fleetgate_store::InsertConflict) -> Self {
        match conflict {
            fleetgate_store::InsertConflict::Id(id) => Self::DuplicateDevice(id),
            fleetgate_store::InsertConflict::Address { address, device_id } => {
                Self::AddressInUse { address, device_id }
            }
        }
    }
}

/// Category of a failed device exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceErrorKind {
    /// No response within the deadline.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// The exchange broke after connecting.
    Transport,
    /// The health endpoint answered but reported a failure.
    Unhealthy,
}

/// A failed exchange with a device.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    /// No response within the deadline.
    #[error("request timed out after {after_ms}ms")]
    Timeout {
        /// The deadline that elapsed.
        after_ms: u64,
    },

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange broke after connecting.
    #[error("transport error: {0}")]
    Transport(String),

    /// The health endpoint answered with a non-2xx status or `success: false`.
    #[error("device reported unhealthy (status {status})")]
    Unhealthy {
        /// HTTP status returned by the device.
        status: u16,
        /// Response body, if any.
        body: Option<serde_json::Value>,
    },
}

impl DeviceError {
    /// Category of this failure.
    #[must_use]
    pub const fn kind(&self) -> DeviceErrorKind {
        match self {
            Self::Timeout { .. } => DeviceErrorKind::Timeout,
            Self::Connect(_) => DeviceErrorKind::Connect,
            Self::Transport(_) => DeviceErrorKind::Transport,
            Self::Unhealthy { .. } => DeviceErrorKind::Unhealthy,
        }
    }

    /// Whatever body the device returned before the failure.
    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Unhealthy { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let id = DeviceId::from_address("10.0.0.1");

        assert_eq!(
            ControlError::DeviceNotFound(id.clone()).http_status_code(),
            404
        );
        assert_eq!(
            ControlError::DuplicateDevice(id.clone()).http_status_code(),
            409
        );
        assert_eq!(
            ControlError::AddressInUse {
                address: "10.0.0.1".into(),
                device_id: id,
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            ControlError::InvalidRequest("x".into()).http_status_code(),
            400
        );
        assert_eq!(ControlError::InvalidId(IdError::Empty).http_status_code(), 400);
        assert_eq!(ControlError::Internal("x".into()).http_status_code(), 500);
    }

    #[test]
    fn insert_conflicts_map_to_registry_errors() {
        let id = DeviceId::new("lobby").unwrap();
        assert!(matches!(
            ControlError::from(fleetgate_store::InsertConflict::Id(id.clone())),
            ControlError::DuplicateDevice(d) if d == id
        ));
        assert!(matches!(
            ControlError::from(fleetgate_store::InsertConflict::Address {
                address: "10.0.0.1".into(),
                device_id: id,
            }),
            ControlError::AddressInUse { address, .. } if address == "10.0.0.1"
        ));
    }

    #[test]
    fn device_error_kinds() {
        assert_eq!(
            DeviceError::Timeout { after_ms: 5 }.kind(),
            DeviceErrorKind::Timeout
        );
        assert_eq!(
            DeviceError::Connect("refused".into()).kind(),
            DeviceErrorKind::Connect
        );

        let unhealthy = DeviceError::Unhealthy {
            status: 503,
            body: Some(serde_json::json!({"success": false})),
        };
        assert_eq!(unhealthy.kind(), DeviceErrorKind::Unhealthy);
        assert!(unhealthy.body().is_some());
        assert!(DeviceError::Transport("eof".into()).body().is_none());
    }
}
