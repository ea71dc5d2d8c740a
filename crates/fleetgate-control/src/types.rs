//! Request, response and configuration types for control operations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetgate_core::DeviceId;
use fleetgate_store::{Device, DeviceStatus};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceErrorKind};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for probing and forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Addresses probed by every discovery sweep.
    #[serde(default)]
    pub candidate_addresses: Vec<String>,
    /// Port used when an address does not carry one.
    #[serde(default = "default_device_port")]
    pub device_port: u16,
    /// Deadline for a single health probe.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Deadline for a single forwarded request.
    #[serde(default = "default_forward_timeout_ms")]
    pub forward_timeout_ms: u64,
    /// Period of the discovery sweep.
    #[serde(default = "default_discovery_interval_secs")]
    pub discovery_interval_secs: u64,
    /// Health-check period as a multiple of the discovery period.
    #[serde(default = "default_health_check_multiplier")]
    pub health_check_multiplier: u32,
}

const fn default_device_port() -> u16 {
    5000
}

const fn default_probe_timeout_ms() -> u64 {
    3_000
}

const fn default_forward_timeout_ms() -> u64 {
    5_000
}

const fn default_discovery_interval_secs() -> u64 {
    30
}

const fn default_health_check_multiplier() -> u32 {
    2
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            candidate_addresses: Vec::new(),
            device_port: default_device_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
            forward_timeout_ms: default_forward_timeout_ms(),
            discovery_interval_secs: default_discovery_interval_secs(),
            health_check_multiplier: default_health_check_multiplier(),
        }
    }
}

impl ControlConfig {
    /// Probe deadline as a Duration.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Forward deadline as a Duration.
    #[must_use]
    pub const fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    /// Discovery sweep period.
    #[must_use]
    pub const fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    /// Health-check sweep period.
    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        self.discovery_interval() * self.health_check_multiplier.max(1)
    }
}

// =============================================================================
// Registry requests
// =============================================================================

/// Request to register a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDeviceRequest {
    /// Host or `host:port` of the device.
    pub address: String,
    /// Display name.
    pub name: String,
    /// Explicit ID; derived from the address when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Free-form location.
    #[serde(default)]
    pub location: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl AddDeviceRequest {
    /// Create a request with the required fields.
    #[must_use]
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            id: None,
            location: None,
            description: None,
        }
    }
}

/// Partial edit of a device. Absent fields are left untouched; an empty
/// `location` or `description` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeviceRequest {
    /// New address.
    #[serde(default)]
    pub address: Option<String>,
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New location.
    #[serde(default)]
    pub location: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Device listing without network details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Device ID.
    pub id: DeviceId,
    /// Display name.
    pub name: String,
    /// Location, if set.
    pub location: Option<String>,
    /// Current status.
    pub status: DeviceStatus,
    /// Last observation time.
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<&Device> for DeviceSummary {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: device.display_name.clone(),
            location: device.location.clone(),
            status: device.status,
            last_seen: device.last_seen,
        }
    }
}

// =============================================================================
// Forwarding
// =============================================================================

/// A request to relay to a device.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRequest {
    /// HTTP method.
    pub method: Method,
    /// Path on the device, including any query string.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl ForwardRequest {
    /// Create a request with no body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Shorthand for a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A completed HTTP exchange with a device, whatever its status code.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResponse {
    /// HTTP status code returned by the device.
    pub status: u16,
    /// Response body: parsed JSON, a JSON string for non-JSON text, or null.
    pub body: serde_json::Value,
}

/// Failure detail for a forward that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardFailure {
    /// Failure category.
    pub kind: DeviceErrorKind,
    /// Human-readable cause.
    pub message: String,
    /// Partial body returned by the device, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl From<&DeviceError> for ForwardFailure {
    fn from(err: &DeviceError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            body: err.body().cloned(),
        }
    }
}

/// Result of forwarding one request to one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardOutcome {
    /// Whether the exchange completed at the transport level.
    pub success: bool,
    /// Target device.
    pub device_id: DeviceId,
    /// Target device name.
    pub device_name: String,
    /// Time spent on the exchange.
    pub latency_ms: u64,
    /// HTTP status returned by the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Device payload, passed through unmodified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Failure detail when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ForwardFailure>,
}

// =============================================================================
// Sweep reports
// =============================================================================

/// Metadata a device reports from its health endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
    /// Overall health flag.
    pub success: Option<bool>,
    /// Hostname.
    pub hostname: Option<String>,
    /// Software version.
    pub version: Option<String>,
    /// Uptime in seconds; devices may send a float.
    pub uptime: Option<serde_json::Value>,
    /// Storage information.
    pub storage: Option<serde_json::Value>,
}

impl HealthReport {
    /// Parse leniently from a response body.
    ///
    /// Each field is read on its own, so a malformed field never hides the
    /// others. Numeric versions are kept as text. Non-object bodies yield an
    /// empty report.
    #[must_use]
    pub fn from_body(body: &serde_json::Value) -> Self {
        let field = |name: &str| body.get(name).filter(|v| !v.is_null());
        let text = |name: &str| match field(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        };

        Self {
            success: field("success").and_then(serde_json::Value::as_bool),
            hostname: field("hostname")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            version: text("version"),
            uptime: field("uptime").filter(|v| v.is_number()).cloned(),
            storage: field("storage").cloned(),
        }
    }

    /// Uptime rounded down to whole seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn uptime_seconds(&self) -> Option<u64> {
        let uptime = self.uptime.as_ref()?;
        uptime.as_u64().or_else(|| {
            uptime
                .as_f64()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| secs as u64)
        })
    }
}

/// A successful health probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    /// HTTP status returned by the device.
    pub status: u16,
    /// Raw response body.
    pub body: serde_json::Value,
    /// Parsed view of the body.
    pub health: HealthReport,
}

/// What a discovery sweep did with one candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscoveryAction {
    /// A new device was registered.
    Created,
    /// An existing device was marked online and its metadata refreshed.
    Refreshed,
    /// An existing online device stopped answering.
    WentOffline,
    /// Nothing answered and nothing changed.
    Unreachable,
    /// A device answered but its ID or address is held by another
    /// registration; nothing was registered.
    Conflict,
}

/// Per-candidate result of a discovery sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    /// Probed address.
    pub address: String,
    /// Device at that address, if any.
    pub device_id: Option<DeviceId>,
    /// What happened.
    pub action: DiscoveryAction,
    /// Probe latency for reachable devices.
    pub latency_ms: Option<u64>,
    /// Probe error for unreachable addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one discovery sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// When the sweep started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the sweep.
    pub duration_ms: u64,
    /// One entry per candidate address.
    pub results: Vec<DiscoveryResult>,
}

impl DiscoveryReport {
    /// Number of candidates that answered.
    #[must_use]
    pub fn reachable(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.action, DiscoveryAction::Created | DiscoveryAction::Refreshed))
            .count()
    }
}

/// Per-device result of a health-check sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    /// Device ID.
    pub device_id: DeviceId,
    /// Display name.
    pub name: String,
    /// Probed address.
    pub address: String,
    /// Status after the probe.
    pub status: DeviceStatus,
    /// Probe latency.
    pub latency_ms: u64,
    /// Raw health response, when the device answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Failure detail, when it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ForwardFailure>,
}

/// Result of one health-check sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckReport {
    /// When the sweep started.
    pub checked_at: DateTime<Utc>,
    /// Wall-clock duration of the sweep.
    pub duration_ms: u64,
    /// Devices that answered.
    pub online: usize,
    /// Devices that did not.
    pub offline: usize,
    /// One entry per known device.
    pub results: Vec<HealthCheckResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_config_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.device_port, 5000);
        assert_eq!(config.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.forward_timeout(), Duration::from_secs(5));
        assert_eq!(config.discovery_interval(), Duration::from_secs(30));
        assert_eq!(config.health_check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn health_interval_never_below_discovery() {
        let config = ControlConfig {
            health_check_multiplier: 0,
            ..Default::default()
        };
        assert_eq!(config.health_check_interval(), config.discovery_interval());
    }

    #[test]
    fn control_config_partial_json() {
        let config: ControlConfig =
            serde_json::from_str(r#"{"candidate_addresses": ["10.0.0.1"], "device_port": 8080}"#)
                .unwrap();
        assert_eq!(config.candidate_addresses, ["10.0.0.1"]);
        assert_eq!(config.device_port, 8080);
        assert_eq!(config.probe_timeout_ms, 3_000);
    }

    #[test]
    fn add_device_request_camel_case() {
        let req: AddDeviceRequest = serde_json::from_value(json!({
            "address": "100.64.0.9",
            "name": "Lobby",
            "location": "Ground floor"
        }))
        .unwrap();
        assert_eq!(req.address, "100.64.0.9");
        assert_eq!(req.location.as_deref(), Some("Ground floor"));
        assert!(req.id.is_none());
    }

    #[test]
    fn health_report_parsing() {
        let report = HealthReport::from_body(&json!({
            "success": true,
            "hostname": "pi-lobby",
            "version": "2.1.0",
            "uptime": 1234.7,
            "storage": {"free": 10}
        }));
        assert_eq!(report.success, Some(true));
        assert_eq!(report.hostname.as_deref(), Some("pi-lobby"));
        assert_eq!(report.uptime_seconds(), Some(1234));

        let integer = HealthReport::from_body(&json!({"uptime": 99}));
        assert_eq!(integer.uptime_seconds(), Some(99));

        let garbage = HealthReport::from_body(&json!("ok"));
        assert_eq!(garbage, HealthReport::default());
    }

    #[test]
    fn health_report_survives_malformed_fields() {
        let report = HealthReport::from_body(&json!({
            "success": false,
            "version": 2,
            "hostname": ["not", "a", "string"],
            "uptime": "long"
        }));
        assert_eq!(report.success, Some(false));
        assert_eq!(report.version.as_deref(), Some("2"));
        assert!(report.hostname.is_none());
        assert!(report.uptime.is_none());
    }

    #[test]
    fn summary_hides_address() {
        let device = Device::new(
            DeviceId::from_address("100.64.0.1"),
            "100.64.0.1",
            "Device 1",
            fleetgate_store::DeviceOrigin::Manual,
        );
        let value = serde_json::to_value(DeviceSummary::from(&device)).unwrap();
        assert_eq!(value["name"], "Device 1");
        assert_eq!(value["status"], "pending");
        assert!(value.get("address").is_none());
        assert!(value.get("lastSeen").is_some());
    }

    #[test]
    fn forward_outcome_serialization() {
        let outcome = ForwardOutcome {
            success: false,
            device_id: DeviceId::from_address("10.0.0.1"),
            device_name: "Device 1".into(),
            latency_ms: 5000,
            status_code: None,
            data: None,
            error: Some(ForwardFailure::from(&DeviceError::Timeout { after_ms: 5000 })),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["deviceId"], "10-0-0-1");
        assert_eq!(value["error"]["kind"], "timeout");
        assert!(value.get("data").is_none());
    }
}
