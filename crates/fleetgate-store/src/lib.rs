//! Device registry storage for fleetgate.
//!
//! This crate holds the authoritative table of known devices and persists it
//! as a JSON snapshot after every mutation.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────── JsonFileStore ──────────────────────────┐
//! │                                                                   │
//! │  RwLock<Table>                                                    │
//! │    order:   [id-a, id-b, ...]         insertion order             │
//! │    records: id -> Arc<Mutex<Device>>  per-device lock             │
//! │                                                                   │
//! │  Mutex<()> writer ──► devices.json.tmp ──rename──► devices.json   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status writes take the table read lock and a single device lock, so
//! observations of different devices never wait on each other. Snapshot
//! writes are serialized through one writer.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use fleetgate_core::DeviceId;
//! use fleetgate_store::{Device, DeviceOrigin, DeviceStatus, DeviceStore, JsonFileStore};
//!
//! let store = JsonFileStore::open("./data/devices.json");
//!
//! let id = DeviceId::from_address("100.64.0.7");
//! store.upsert(Device::new(id.clone(), "100.64.0.7", "Device 1", DeviceOrigin::Manual));
//! store.set_status(&id, DeviceStatus::Online, Utc::now(), Some(42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod json;
pub mod types;

pub use error::{InsertConflict, Result, StoreError};
pub use json::JsonFileStore;
pub use types::{
    Device, DeviceCapabilities, DeviceOrigin, DeviceStatus, RegistrySnapshot, StatusUpdate,
};

use chrono::{DateTime, Utc};
use fleetgate_core::DeviceId;

/// The storage trait defining all registry operations.
///
/// Mutating operations persist before returning. Persistence failures are
/// logged and never undo the in-memory change; call [`DeviceStore::flush`]
/// to observe them.
pub trait DeviceStore: Send + Sync {
    // =========================================================================
    // Queries
    // =========================================================================

    /// Get a device by ID.
    fn get(&self, id: &DeviceId) -> Option<Device>;

    /// List all devices in insertion order.
    fn list(&self) -> Vec<Device>;

    /// Find the device registered at the given address.
    fn find_by_address(&self, address: &str) -> Option<Device>;

    /// Number of devices in the registry.
    fn len(&self) -> usize;

    /// Whether the registry is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert a device, or replace the record with the same ID.
    fn upsert(&self, device: Device);

    /// Insert a device unless its ID or its address is already registered.
    ///
    /// The check and the insert are one step: of two racing inserts for the
    /// same ID or address exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns the conflicting registration. The store is left unchanged.
    fn insert_if_absent(&self, device: Device) -> std::result::Result<(), InsertConflict>;

    /// Remove a device. Returns `false` if it was not present.
    fn remove(&self, id: &DeviceId) -> bool;

    /// Record a status observation.
    ///
    /// Observations older than the device's `last_seen` are ignored and
    /// reported with `applied == false`. Returns `None` if the device does
    /// not exist.
    fn set_status(
        &self,
        id: &DeviceId,
        status: DeviceStatus,
        observed_at: DateTime<Utc>,
        response_time_ms: Option<u64>,
    ) -> Option<StatusUpdate>;

    /// Apply an in-place edit to a device and return the result.
    ///
    /// The device ID cannot be changed through this method.
    fn update(&self, id: &DeviceId, edit: &mut dyn FnMut(&mut Device)) -> Option<Device>;

    /// Write the current state to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or written.
    fn flush(&self) -> Result<()>;
}
