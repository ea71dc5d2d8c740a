//! Error types for the storage layer.

use fleetgate_core::DeviceId;
use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while persisting the registry snapshot.
///
/// In-memory operations never fail; these surface only from an explicit
/// [`crate::DeviceStore::flush`] and in log output for implicit writes.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the snapshot file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why [`crate::DeviceStore::insert_if_absent`] refused a device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertConflict {
    /// A device with the same ID is already registered.
    #[error("device already registered: {0}")]
    Id(DeviceId),

    /// Another device is registered at the same address.
    #[error("address {address} is already registered to device {device_id}")]
    Address {
        /// The contested address.
        address: String,
        /// The device holding it.
        device_id: DeviceId,
    },
}
