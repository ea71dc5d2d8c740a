//! Discovery and health-check sweeps.
//!
//! Both sweeps probe every target concurrently and then apply the results to
//! the store one by one, in target order. Unreachable devices are outcomes,
//! not errors: a sweep always completes and always returns a report.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use fleetgate_core::DeviceId;
use fleetgate_store::{
    Device, DeviceCapabilities, DeviceOrigin, DeviceStatus, DeviceStore, InsertConflict,
};
use futures::future::join_all;

use crate::client::DeviceClient;
use crate::error::DeviceError;
use crate::lifecycle::{self, record_observation};
use crate::telemetry::{elapsed_ms, ObservationSource, TelemetrySink};
use crate::types::{
    DiscoveryAction, DiscoveryReport, DiscoveryResult, ForwardFailure, HealthCheckReport,
    HealthCheckResult, HealthReport, ProbeResponse,
};

/// One finished probe.
struct ProbeAttempt {
    result: Result<ProbeResponse, DeviceError>,
    latency_ms: u64,
    observed_at: DateTime<Utc>,
}

/// Runs discovery and health-check sweeps against the device store.
pub struct ProbeEngine<S: DeviceStore> {
    store: Arc<S>,
    client: Arc<dyn DeviceClient>,
    telemetry: Arc<dyn TelemetrySink>,
    candidates: Vec<String>,
}

impl<S: DeviceStore> ProbeEngine<S> {
    /// Create an engine probing `candidates` during discovery.
    ///
    /// Blank and duplicate candidate addresses are dropped.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        client: Arc<dyn DeviceClient>,
        telemetry: Arc<dyn TelemetrySink>,
        candidates: Vec<String>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(candidates.len());
        for address in candidates {
            let address = address.trim();
            if !address.is_empty() && !unique.iter().any(|a| a == address) {
                unique.push(address.to_string());
            }
        }

        Self {
            store,
            client,
            telemetry,
            candidates: unique,
        }
    }

    /// Candidate addresses probed by discovery.
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    async fn probe(&self, address: &str) -> ProbeAttempt {
        let started = Instant::now();
        let result = self.client.probe(address).await;
        ProbeAttempt {
            result,
            latency_ms: elapsed_ms(started),
            observed_at: Utc::now(),
        }
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Run a discovery sweep, registering new devices as `Discovered`.
    pub async fn discover(&self) -> DiscoveryReport {
        self.discover_as(DeviceOrigin::Discovered).await
    }

    /// Run the startup discovery sweep over the seed addresses.
    pub async fn discover_seeds(&self) -> DiscoveryReport {
        self.discover_as(DeviceOrigin::Seed).await
    }

    async fn discover_as(&self, origin: DeviceOrigin) -> DiscoveryReport {
        let started_at = Utc::now();
        let started = Instant::now();

        let attempts = join_all(self.candidates.iter().map(|address| self.probe(address))).await;

        let results: Vec<DiscoveryResult> = self
            .candidates
            .iter()
            .zip(attempts)
            .map(|(address, attempt)| self.apply_discovery(address, attempt, origin))
            .collect();

        let report = DiscoveryReport {
            started_at,
            duration_ms: elapsed_ms(started),
            results,
        };
        tracing::info!(
            candidates = report.results.len(),
            reachable = report.reachable(),
            duration_ms = report.duration_ms,
            "Discovery sweep complete"
        );
        report
    }

    fn apply_discovery(
        &self,
        address: &str,
        attempt: ProbeAttempt,
        origin: DeviceOrigin,
    ) -> DiscoveryResult {
        let existing = self.store.find_by_address(address);
        let reachable = attempt.result.is_ok();
        if let Some(device) = &existing {
            self.telemetry.latency_observed(
                &device.id,
                attempt.latency_ms,
                reachable,
                ObservationSource::Discovery,
            );
        }

        match (attempt.result, existing) {
            (Ok(response), Some(device)) => {
                self.refresh_metadata(&device.id, &response.health);
                record_observation(
                    &*self.store,
                    &*self.telemetry,
                    &device.id,
                    DeviceStatus::Online,
                    attempt.observed_at,
                    Some(attempt.latency_ms),
                    ObservationSource::Discovery,
                );
                DiscoveryResult {
                    address: address.to_string(),
                    device_id: Some(device.id),
                    action: DiscoveryAction::Refreshed,
                    latency_ms: Some(attempt.latency_ms),
                    error: None,
                }
            }
            (Ok(response), None) => {
                let device = match self.register(
                    address,
                    &response.health,
                    attempt.observed_at,
                    attempt.latency_ms,
                    origin,
                ) {
                    Ok(device) => device,
                    Err(conflict) => {
                        tracing::warn!(
                            address = %address,
                            conflict = %conflict,
                            "Skipping discovered device"
                        );
                        let error = conflict.to_string();
                        let (InsertConflict::Id(holder)
                        | InsertConflict::Address {
                            device_id: holder, ..
                        }) = conflict;
                        return DiscoveryResult {
                            address: address.to_string(),
                            device_id: Some(holder),
                            action: DiscoveryAction::Conflict,
                            latency_ms: Some(attempt.latency_ms),
                            error: Some(error),
                        };
                    }
                };
                let id = device.id.clone();
                tracing::info!(
                    device_id = %id,
                    address = %address,
                    name = %device.display_name,
                    "Discovered new device"
                );
                self.telemetry
                    .status_changed(&device, None, ObservationSource::Discovery);
                self.telemetry.latency_observed(
                    &id,
                    attempt.latency_ms,
                    true,
                    ObservationSource::Discovery,
                );
                DiscoveryResult {
                    address: address.to_string(),
                    device_id: Some(id),
                    action: DiscoveryAction::Created,
                    latency_ms: Some(attempt.latency_ms),
                    error: None,
                }
            }
            (Err(err), Some(device)) => {
                let action = match lifecycle::after_discovery(device.status, false) {
                    Some(status) => {
                        record_observation(
                            &*self.store,
                            &*self.telemetry,
                            &device.id,
                            status,
                            attempt.observed_at,
                            None,
                            ObservationSource::Discovery,
                        );
                        DiscoveryAction::WentOffline
                    }
                    None => DiscoveryAction::Unreachable,
                };
                DiscoveryResult {
                    address: address.to_string(),
                    device_id: Some(device.id),
                    action,
                    latency_ms: None,
                    error: Some(err.to_string()),
                }
            }
            (Err(err), None) => {
                tracing::debug!(address = %address, error = %err, "Candidate address unreachable");
                DiscoveryResult {
                    address: address.to_string(),
                    device_id: None,
                    action: DiscoveryAction::Unreachable,
                    latency_ms: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    fn register(
        &self,
        address: &str,
        health: &HealthReport,
        observed_at: DateTime<Utc>,
        latency_ms: u64,
        origin: DeviceOrigin,
    ) -> Result<Device, InsertConflict> {
        let name = health
            .hostname
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| format!("Device {}", self.store.len() + 1));

        let mut device = Device::new(DeviceId::from_address(address), address, name, origin);
        device.status = DeviceStatus::Online;
        device.last_seen = Some(observed_at);
        device.response_time_ms = Some(latency_ms);
        apply_health(&mut device, health);

        self.store.insert_if_absent(device.clone())?;
        Ok(device)
    }

    fn refresh_metadata(&self, id: &DeviceId, health: &HealthReport) {
        self.store.update(id, &mut |device| apply_health(device, health));
    }

    // =========================================================================
    // Health check
    // =========================================================================

    /// Probe every known device and record the outcome.
    pub async fn health_check(&self) -> HealthCheckReport {
        let checked_at = Utc::now();
        let started = Instant::now();

        let devices = self.store.list();
        let attempts = join_all(devices.iter().map(|d| self.probe(&d.address))).await;

        let results: Vec<HealthCheckResult> = devices
            .into_iter()
            .zip(attempts)
            .map(|(device, attempt)| self.apply_health_check(device, attempt))
            .collect();

        let online = results
            .iter()
            .filter(|r| r.status == DeviceStatus::Online)
            .count();
        let report = HealthCheckReport {
            checked_at,
            duration_ms: elapsed_ms(started),
            online,
            offline: results.len() - online,
            results,
        };
        tracing::info!(
            devices = report.results.len(),
            online = report.online,
            offline = report.offline,
            duration_ms = report.duration_ms,
            "Health check complete"
        );
        report
    }

    fn apply_health_check(&self, device: Device, attempt: ProbeAttempt) -> HealthCheckResult {
        let reachable = attempt.result.is_ok();
        self.telemetry.latency_observed(
            &device.id,
            attempt.latency_ms,
            reachable,
            ObservationSource::HealthCheck,
        );

        if let Ok(response) = &attempt.result {
            self.refresh_metadata(&device.id, &response.health);
        }
        let update = record_observation(
            &*self.store,
            &*self.telemetry,
            &device.id,
            lifecycle::after_observation(reachable),
            attempt.observed_at,
            reachable.then_some(attempt.latency_ms),
            ObservationSource::HealthCheck,
        );
        // Removed mid-sweep: report what was observed.
        let status = update.map_or(lifecycle::after_observation(reachable), |u| u.device.status);

        let (response, error) = match attempt.result {
            Ok(response) => (Some(response.body), None),
            Err(err) => (None, Some(ForwardFailure::from(&err))),
        };
        HealthCheckResult {
            device_id: device.id,
            name: device.display_name,
            address: device.address,
            status,
            latency_ms: attempt.latency_ms,
            response,
            error,
        }
    }
}

fn apply_health(device: &mut Device, health: &HealthReport) {
    if health.version.is_some() {
        device.version.clone_from(&health.version);
    }
    device.capabilities = DeviceCapabilities {
        hostname: health.hostname.clone(),
        uptime_seconds: health.uptime_seconds(),
        storage: health.storage.clone(),
    };
}
