//! Status-change and latency events.
//!
//! The probe engine and the forwarder report every observation here. The
//! default sink turns them into `tracing` events; log format and storage are
//! left to the subscriber installed by the binary.

use std::time::Instant;

use fleetgate_core::DeviceId;
use fleetgate_store::{Device, DeviceStatus};
use serde::Serialize;

/// What produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ObservationSource {
    /// A discovery sweep.
    Discovery,
    /// A health-check sweep.
    HealthCheck,
    /// A forwarded request.
    Forward,
}

impl ObservationSource {
    /// Short name for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::HealthCheck => "health_check",
            Self::Forward => "forward",
        }
    }
}

/// Receiver of device observations.
pub trait TelemetrySink: Send + Sync {
    /// A device changed status. `previous` is `None` for a newly created device.
    fn status_changed(
        &self,
        device: &Device,
        previous: Option<DeviceStatus>,
        source: ObservationSource,
    );

    /// An exchange with a device finished.
    fn latency_observed(
        &self,
        device_id: &DeviceId,
        latency_ms: u64,
        success: bool,
        source: ObservationSource,
    );
}

/// Sink that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn status_changed(
        &self,
        device: &Device,
        previous: Option<DeviceStatus>,
        source: ObservationSource,
    ) {
        let previous = previous.map_or("none", DeviceStatus::as_str);
        match device.status {
            DeviceStatus::Offline => tracing::warn!(
                device_id = %device.id,
                name = %device.display_name,
                address = %device.address,
                previous,
                current = %device.status,
                source = source.as_str(),
                "Device status changed"
            ),
            _ => tracing::info!(
                device_id = %device.id,
                name = %device.display_name,
                address = %device.address,
                previous,
                current = %device.status,
                source = source.as_str(),
                "Device status changed"
            ),
        }
    }

    fn latency_observed(
        &self,
        device_id: &DeviceId,
        latency_ms: u64,
        success: bool,
        source: ObservationSource,
    ) {
        tracing::debug!(
            device_id = %device_id,
            latency_ms,
            success,
            source = source.as_str(),
            "Device latency"
        );
    }
}

/// Milliseconds since `started`, saturating.
pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// A sink that records events for assertions in tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod recording {
    use parking_lot::Mutex;

    use super::{ObservationSource, TelemetrySink};
    use fleetgate_core::DeviceId;
    use fleetgate_store::{Device, DeviceStatus};

    /// One recorded event.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TelemetryEvent {
        /// See [`TelemetrySink::status_changed`].
        StatusChanged {
            /// Device ID.
            device_id: DeviceId,
            /// Status before the change.
            previous: Option<DeviceStatus>,
            /// Status after the change.
            current: DeviceStatus,
            /// Origin of the observation.
            source: ObservationSource,
        },
        /// See [`TelemetrySink::latency_observed`].
        Latency {
            /// Device ID.
            device_id: DeviceId,
            /// Whether the exchange succeeded.
            success: bool,
            /// Origin of the observation.
            source: ObservationSource,
        },
    }

    /// Records every event in memory.
    #[derive(Debug, Default)]
    pub struct RecordingTelemetry {
        events: Mutex<Vec<TelemetryEvent>>,
    }

    impl RecordingTelemetry {
        /// Create an empty recorder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// All events so far.
        pub fn events(&self) -> Vec<TelemetryEvent> {
            self.events.lock().clone()
        }

        /// Only the status changes.
        pub fn status_changes(&self) -> Vec<TelemetryEvent> {
            self.events()
                .into_iter()
                .filter(|e| matches!(e, TelemetryEvent::StatusChanged { .. }))
                .collect()
        }
    }

    impl TelemetrySink for RecordingTelemetry {
        fn status_changed(
            &self,
            device: &Device,
            previous: Option<DeviceStatus>,
            source: ObservationSource,
        ) {
            self.events.lock().push(TelemetryEvent::StatusChanged {
                device_id: device.id.clone(),
                previous,
                current: device.status,
                source,
            });
        }

        fn latency_observed(
            &self,
            device_id: &DeviceId,
            _latency_ms: u64,
            success: bool,
            source: ObservationSource,
        ) {
            self.events.lock().push(TelemetryEvent::Latency {
                device_id: device_id.clone(),
                success,
                source,
            });
        }
    }
}
