//! Domain types stored in the registry.
//!
//! These types represent the persisted state of devices. They serialize as
//! camelCase JSON so the snapshot file can be read by the frontend tooling.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fleetgate_core::DeviceId;
use serde::{Deserialize, Serialize};

/// A device record stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Unique identifier for the device.
    pub id: DeviceId,
    /// Host (optionally `host:port`) used to reach the device.
    pub address: String,
    /// Human-readable name.
    pub display_name: String,
    /// Free-form physical location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current reachability.
    pub status: DeviceStatus,
    /// Timestamp of the last status observation.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Latency of the last observation, in milliseconds.
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    /// Software version last reported by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Last metadata snapshot reported by the device.
    #[serde(default)]
    pub capabilities: DeviceCapabilities,
    /// How the device entered the registry.
    #[serde(default)]
    pub origin: DeviceOrigin,
    /// Registration timestamp.
    pub registered_at: DateTime<Utc>,
}

impl Device {
    /// Create a new device in the `Pending` state.
    #[must_use]
    pub fn new(
        id: DeviceId,
        address: impl Into<String>,
        display_name: impl Into<String>,
        origin: DeviceOrigin,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            display_name: display_name.into(),
            location: None,
            description: None,
            status: DeviceStatus::Pending,
            last_seen: None,
            response_time_ms: None,
            version: None,
            capabilities: DeviceCapabilities::default(),
            origin,
            registered_at: Utc::now(),
        }
    }

    /// Whether the device answered its most recent observation.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        matches!(self.status, DeviceStatus::Online)
    }
}

/// Self-reported metadata from the device's health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    /// Hostname reported by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Device uptime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    /// Storage information, passed through as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<serde_json::Value>,
}

/// Reachability state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Registered but not yet probed.
    Pending,
    /// The last probe or forward reached the device.
    Online,
    /// The last probe or forward failed at the transport level.
    Offline,
}

impl DeviceStatus {
    /// Lowercase name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a device record was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOrigin {
    /// Found during startup discovery of the configured seed addresses.
    Seed,
    /// Registered by an administrator.
    #[default]
    Manual,
    /// Found by a periodic discovery sweep.
    Discovered,
}

/// Result of a [`crate::DeviceStore::set_status`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// The device after the call.
    pub device: Device,
    /// Status before the call.
    pub previous: DeviceStatus,
    /// False when the observation was older than `last_seen` and was ignored.
    pub applied: bool,
}

impl StatusUpdate {
    /// Whether the call moved the device to a different status.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.applied && self.previous != self.device.status
    }
}

/// On-disk layout of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    /// All devices keyed by ID.
    pub devices: BTreeMap<DeviceId, Device>,
    /// When the snapshot was written.
    pub last_updated: DateTime<Utc>,
}
