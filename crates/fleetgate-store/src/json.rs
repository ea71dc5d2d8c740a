//! JSON snapshot storage implementation.
//!
//! This module provides the `JsonFileStore` implementation of the `DeviceStore` trait.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetgate_core::DeviceId;
use parking_lot::{Mutex, RwLock};

use crate::error::{InsertConflict, Result};
use crate::types::{Device, DeviceStatus, RegistrySnapshot, StatusUpdate};
use crate::DeviceStore;

type Record = Arc<Mutex<Device>>;

#[derive(Default)]
struct Table {
    order: Vec<DeviceId>,
    records: HashMap<DeviceId, Record>,
}

impl Table {
    fn from_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let mut devices: Vec<Device> = devices.into_iter().collect();
        devices.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut table = Self::default();
        for device in devices {
            if !table.records.contains_key(&device.id) {
                table.order.push(device.id.clone());
            }
            table
                .records
                .insert(device.id.clone(), Arc::new(Mutex::new(device)));
        }
        table
    }

    fn record(&self, id: &DeviceId) -> Option<Record> {
        self.records.get(id).cloned()
    }
}

/// Device store backed by a JSON snapshot file.
///
/// The in-memory table is authoritative. Every mutation rewrites the whole
/// snapshot through a temporary file and an atomic rename.
pub struct JsonFileStore {
    path: Option<PathBuf>,
    table: RwLock<Table>,
    writer: Mutex<()>,
}

impl JsonFileStore {
    /// Open the registry at `path`.
    ///
    /// A missing file yields an empty registry. An unreadable or malformed
    /// file also yields an empty registry and logs a warning; the bad file is
    /// overwritten by the next mutation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let devices = match Self::load(&path) {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    path = %path.display(),
                    devices = snapshot.devices.len(),
                    last_updated = %snapshot.last_updated,
                    "Loaded device registry"
                );
                snapshot.devices
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "No device registry found, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load device registry, starting empty"
                );
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            table: RwLock::new(Table::from_devices(devices.into_values())),
            writer: Mutex::new(()),
        }
    }

    /// Create a store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: RwLock::new(Table::default()),
            writer: Mutex::new(()),
        }
    }

    /// Path of the snapshot file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn load(path: &Path) -> Result<Option<RegistrySnapshot>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Capture a consistent copy of every record.
    fn snapshot(&self) -> RegistrySnapshot {
        let table = self.table.read();
        let devices = table
            .records
            .iter()
            .map(|(id, record)| (id.clone(), record.lock().clone()))
            .collect();

        RegistrySnapshot {
            devices,
            last_updated: Utc::now(),
        }
    }

    fn write_snapshot(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Snapshot is taken while holding the writer, so the file on disk
        // always reflects at least every mutation that finished before it.
        let _writer = self.writer.lock();
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        tracing::trace!(path = %path.display(), devices = snapshot.devices.len(), "Registry persisted");
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.write_snapshot() {
            tracing::error!(error = %e, "Failed to persist device registry");
        }
    }
}

impl DeviceStore for JsonFileStore {
    // =========================================================================
    // Queries
    // =========================================================================

    fn get(&self, id: &DeviceId) -> Option<Device> {
        let record = self.table.read().record(id)?;
        let device = record.lock().clone();
        Some(device)
    }

    fn list(&self) -> Vec<Device> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|id| table.records.get(id))
            .map(|record| record.lock().clone())
            .collect()
    }

    fn find_by_address(&self, address: &str) -> Option<Device> {
        let address = address.trim();
        self.list()
            .into_iter()
            .find(|d| d.address.eq_ignore_ascii_case(address))
    }

    fn len(&self) -> usize {
        self.table.read().records.len()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn upsert(&self, device: Device) {
        {
            let mut table = self.table.write();
            if let Some(record) = table.records.get(&device.id) {
                *record.lock() = device;
            } else {
                let id = device.id.clone();
                table.order.push(id.clone());
                table.records.insert(id, Arc::new(Mutex::new(device)));
            }
        }
        self.persist();
    }

    fn insert_if_absent(&self, device: Device) -> std::result::Result<(), InsertConflict> {
        {
            let mut table = self.table.write();
            if table.records.contains_key(&device.id) {
                return Err(InsertConflict::Id(device.id));
            }

            let address = device.address.trim();
            let holder = table.records.values().find_map(|record| {
                let existing = record.lock();
                existing
                    .address
                    .eq_ignore_ascii_case(address)
                    .then(|| existing.id.clone())
            });
            if let Some(device_id) = holder {
                return Err(InsertConflict::Address {
                    address: device.address,
                    device_id,
                });
            }

            let id = device.id.clone();
            table.order.push(id.clone());
            table.records.insert(id, Arc::new(Mutex::new(device)));
        }
        self.persist();
        Ok(())
    }

    fn remove(&self, id: &DeviceId) -> bool {
        {
            let mut table = self.table.write();
            if table.records.remove(id).is_none() {
                return false;
            }
            table.order.retain(|existing| existing != id);
        }
        self.persist();
        true
    }

    fn set_status(
        &self,
        id: &DeviceId,
        status: DeviceStatus,
        observed_at: DateTime<Utc>,
        response_time_ms: Option<u64>,
    ) -> Option<StatusUpdate> {
        let record = self.table.read().record(id)?;

        let update = {
            let mut device = record.lock();
            let previous = device.status;
            let stale = device.last_seen.is_some_and(|seen| observed_at < seen);
            if !stale {
                device.status = status;
                device.last_seen = Some(observed_at);
                if response_time_ms.is_some() {
                    device.response_time_ms = response_time_ms;
                }
            }
            StatusUpdate {
                device: device.clone(),
                previous,
                applied: !stale,
            }
        };

        if update.applied {
            self.persist();
        } else {
            tracing::debug!(
                device_id = %id,
                observed_at = %observed_at,
                "Ignoring stale status observation"
            );
        }
        Some(update)
    }

    fn update(&self, id: &DeviceId, edit: &mut dyn FnMut(&mut Device)) -> Option<Device> {
        let record = self.table.read().record(id)?;

        let device = {
            let mut device = record.lock();
            edit(&mut device);
            device.id = id.clone();
            device.clone()
        };

        self.persist();
        Some(device)
    }

    fn flush(&self) -> Result<()> {
        self.write_snapshot()
    }
}
