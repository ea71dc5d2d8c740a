//! Request forwarding to devices.
//!
//! Every forward is also a liveness observation: a completed exchange marks
//! the device online, a transport failure marks it offline. HTTP error
//! statuses from the device count as completed exchanges and are passed
//! through to the caller as data.
//!
//! The status write runs on the blocking pool, since every write rewrites the
//! registry snapshot on disk.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use fleetgate_core::DeviceId;
use fleetgate_store::{Device, DeviceStore};
use futures::future::join_all;

use crate::client::DeviceClient;
use crate::error::{ControlError, Result};
use crate::lifecycle::{self, record_observation_blocking};
use crate::telemetry::{elapsed_ms, ObservationSource, TelemetrySink};
use crate::types::{ForwardFailure, ForwardOutcome, ForwardRequest};

/// Path queried on every device by [`Forwarder::forward_all_status`].
pub const STATUS_PATH: &str = "/status";

/// Relays requests to devices and records the outcome.
pub struct Forwarder<S: DeviceStore> {
    store: Arc<S>,
    client: Arc<dyn DeviceClient>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl<S: DeviceStore> Forwarder<S> {
    /// Create a forwarder.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        client: Arc<dyn DeviceClient>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            store,
            client,
            telemetry,
        }
    }
}

impl<S: DeviceStore + 'static> Forwarder<S> {
    /// Forward `request` to the device with the given ID.
    ///
    /// Transport failures are reported in the outcome, not as errors.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DeviceNotFound` if the device is not registered.
    /// No request is sent in that case.
    pub async fn forward(&self, id: &DeviceId, request: &ForwardRequest) -> Result<ForwardOutcome> {
        let device = self
            .store
            .get(id)
            .ok_or_else(|| ControlError::DeviceNotFound(id.clone()))?;
        Ok(self.forward_to(&device, request).await)
    }

    /// Query `/status` on every known device concurrently.
    ///
    /// Returns one outcome per device in listing order. A failing device
    /// never affects the others.
    pub async fn forward_all_status(&self) -> Vec<ForwardOutcome> {
        let devices = self.store.list();
        let request = ForwardRequest::get(STATUS_PATH);
        join_all(devices.iter().map(|device| self.forward_to(device, &request))).await
    }

    async fn forward_to(&self, device: &Device, request: &ForwardRequest) -> ForwardOutcome {
        let started = Instant::now();
        let result = self.client.send(&device.address, request).await;
        let latency_ms = elapsed_ms(started);
        let observed_at = Utc::now();
        let success = result.is_ok();

        self.telemetry
            .latency_observed(&device.id, latency_ms, success, ObservationSource::Forward);
        record_observation_blocking(
            &self.store,
            &self.telemetry,
            &device.id,
            lifecycle::after_observation(success),
            observed_at,
            success.then_some(latency_ms),
            ObservationSource::Forward,
        )
        .await;

        match result {
            Ok(response) => {
                tracing::debug!(
                    device_id = %device.id,
                    method = %request.method,
                    path = %request.path,
                    status = response.status,
                    latency_ms,
                    "Forwarded request"
                );
                ForwardOutcome {
                    success: true,
                    device_id: device.id.clone(),
                    device_name: device.display_name.clone(),
                    latency_ms,
                    status_code: Some(response.status),
                    data: Some(response.body),
                    error: None,
                }
            }
            Err(err) => {
                tracing::warn!(
                    device_id = %device.id,
                    method = %request.method,
                    path = %request.path,
                    error = %err,
                    latency_ms,
                    "Forward failed"
                );
                ForwardOutcome {
                    success: false,
                    device_id: device.id.clone(),
                    device_name: device.display_name.clone(),
                    latency_ms,
                    status_code: None,
                    data: None,
                    error: Some(ForwardFailure::from(&err)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockDeviceClient;
    use crate::error::{DeviceError, DeviceErrorKind};
    use crate::telemetry::recording::{RecordingTelemetry, TelemetryEvent};
    use fleetgate_store::{DeviceOrigin, DeviceStatus, JsonFileStore};
    use reqwest::Method;
    use serde_json::json;

    fn setup(
        client: MockDeviceClient,
        addresses: &[&str],
    ) -> (
        Forwarder<JsonFileStore>,
        Arc<JsonFileStore>,
        Arc<MockDeviceClient>,
        Arc<RecordingTelemetry>,
    ) {
        let store = Arc::new(JsonFileStore::in_memory());
        for (i, address) in addresses.iter().enumerate() {
            store.upsert(Device::new(
                DeviceId::from_address(address),
                *address,
                format!("Device {}", i + 1),
                DeviceOrigin::Manual,
            ));
        }
        let client = Arc::new(client);
        let telemetry = Arc::new(RecordingTelemetry::new());
        let forwarder = Forwarder::new(store.clone(), client.clone(), telemetry.clone());
        (forwarder, store, client, telemetry)
    }

    /// Records which thread performs each status write.
    struct ThreadTrackingStore {
        inner: JsonFileStore,
        status_writers: parking_lot::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl DeviceStore for ThreadTrackingStore {
        fn get(&self, id: &DeviceId) -> Option<Device> {
            self.inner.get(id)
        }
        fn list(&self) -> Vec<Device> {
            self.inner.list()
        }
        fn find_by_address(&self, address: &str) -> Option<Device> {
            self.inner.find_by_address(address)
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
        fn upsert(&self, device: Device) {
            self.inner.upsert(device);
        }
        fn insert_if_absent(
            &self,
            device: Device,
        ) -> std::result::Result<(), fleetgate_store::InsertConflict> {
            self.inner.insert_if_absent(device)
        }
        fn remove(&self, id: &DeviceId) -> bool {
            self.inner.remove(id)
        }
        fn set_status(
            &self,
            id: &DeviceId,
            status: DeviceStatus,
            observed_at: chrono::DateTime<Utc>,
            response_time_ms: Option<u64>,
        ) -> Option<fleetgate_store::StatusUpdate> {
            self.status_writers.lock().push(std::thread::current().id());
            self.inner.set_status(id, status, observed_at, response_time_ms)
        }
        fn update(&self, id: &DeviceId, edit: &mut dyn FnMut(&mut Device)) -> Option<Device> {
            self.inner.update(id, edit)
        }
        fn flush(&self) -> fleetgate_store::Result<()> {
            self.inner.flush()
        }
    }

    #[tokio::test]
    async fn status_write_runs_off_the_request_thread() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(ThreadTrackingStore {
            inner: JsonFileStore::open(dir.path().join("devices.json")),
            status_writers: parking_lot::Mutex::new(Vec::new()),
        });
        let id = DeviceId::from_address("100.64.0.1");
        store.upsert(Device::new(id.clone(), "100.64.0.1", "Lobby", DeviceOrigin::Manual));
        let forwarder = Forwarder::new(
            store.clone(),
            Arc::new(MockDeviceClient::new().with_device("100.64.0.1", json!({"success": true}))),
            Arc::new(RecordingTelemetry::new()),
        );

        let outcome = forwarder.forward(&id, &ForwardRequest::get("/status")).await.unwrap();
        assert!(outcome.success);

        // The current-thread runtime polls this test on its own thread.
        let writers = store.status_writers.lock().clone();
        assert_eq!(writers.len(), 1);
        assert_ne!(writers[0], std::thread::current().id());

        // Written before `forward` returned, on disk included.
        assert_eq!(store.get(&id).unwrap().status, DeviceStatus::Online);
        let reloaded = JsonFileStore::open(dir.path().join("devices.json"));
        assert_eq!(reloaded.get(&id).unwrap().status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn forward_unknown_device_makes_no_call() {
        let (forwarder, _store, client, telemetry) = setup(MockDeviceClient::new(), &[]);

        let err = forwarder
            .forward(&DeviceId::from_address("10.9.9.9"), &ForwardRequest::get("/status"))
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::DeviceNotFound(_)));
        assert_eq!(client.send_calls(), 0);
        assert!(telemetry.events().is_empty());
    }

    #[tokio::test]
    async fn forward_success_marks_online() {
        let (forwarder, store, client, _telemetry) = setup(
            MockDeviceClient::new().with_device("100.64.0.1", json!({"success": true})),
            &["100.64.0.1"],
        );
        let id = DeviceId::from_address("100.64.0.1");

        let request = ForwardRequest::new(Method::POST, "/display/on").with_body(json!({"on": true}));
        let outcome = forwarder.forward(&id, &request).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.device_name, "Device 1");
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.data.as_ref().unwrap()["path"], "/display/on");

        let device = store.get(&id).unwrap();
        assert_eq!(device.status, DeviceStatus::Online);
        assert_eq!(device.response_time_ms, Some(outcome.latency_ms));

        let sent = client.sent();
        assert_eq!(sent[0].1, request);
    }

    #[tokio::test]
    async fn device_error_status_is_passed_through() {
        let client = MockDeviceClient::new();
        client.set_reply("100.64.0.1", 500, json!({"error": "panel busy"}));
        let (forwarder, store, _client, _telemetry) = setup(client, &["100.64.0.1"]);
        let id = DeviceId::from_address("100.64.0.1");

        let outcome = forwarder
            .forward(&id, &ForwardRequest::get("/status"))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(500));
        assert_eq!(outcome.data, Some(json!({"error": "panel busy"})));
        assert_eq!(store.get(&id).unwrap().status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn transport_failure_marks_offline() {
        let client = MockDeviceClient::new();
        client.set_failing("100.64.0.1", DeviceError::Timeout { after_ms: 5000 });
        let (forwarder, store, _client, telemetry) = setup(client, &["100.64.0.1"]);
        let id = DeviceId::from_address("100.64.0.1");

        let outcome = forwarder
            .forward(&id, &ForwardRequest::get("/status"))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.data.is_none());
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, DeviceErrorKind::Timeout);

        assert_eq!(store.get(&id).unwrap().status, DeviceStatus::Offline);
        assert_eq!(
            telemetry.status_changes(),
            vec![TelemetryEvent::StatusChanged {
                device_id: id,
                previous: Some(DeviceStatus::Pending),
                current: DeviceStatus::Offline,
                source: ObservationSource::Forward,
            }]
        );
    }

    #[tokio::test]
    async fn forward_all_status_isolates_failures() {
        let client = MockDeviceClient::new()
            .with_device("100.64.0.1", json!({"success": true}))
            .with_device("100.64.0.3", json!({"success": true}));
        client.set_unreachable("100.64.0.2");
        client.set_failing("100.64.0.4", DeviceError::Timeout { after_ms: 5000 });
        let addresses = ["100.64.0.1", "100.64.0.2", "100.64.0.3", "100.64.0.4"];
        let (forwarder, store, client, _telemetry) = setup(client, &addresses);

        let outcomes = forwarder.forward_all_status().await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes.iter().filter(|o| o.success).count(), 2);
        let flags: Vec<_> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(flags, [true, false, true, false]);
        assert!(outcomes[0].data.as_ref().unwrap()["path"] == STATUS_PATH);
        assert_eq!(client.send_calls(), 4);

        let statuses: Vec<_> = store.list().into_iter().map(|d| d.status).collect();
        assert_eq!(
            statuses,
            [
                DeviceStatus::Online,
                DeviceStatus::Offline,
                DeviceStatus::Online,
                DeviceStatus::Offline
            ]
        );
    }

    #[tokio::test]
    async fn forward_all_status_with_no_devices() {
        let (forwarder, _store, client, _telemetry) = setup(MockDeviceClient::new(), &[]);
        assert!(forwarder.forward_all_status().await.is_empty());
        assert_eq!(client.send_calls(), 0);
    }
}
