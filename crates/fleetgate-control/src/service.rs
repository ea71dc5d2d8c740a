//! Device control service implementation.
//!
//! This module provides the `DeviceControl` trait and `DeviceControlService`
//! implementation that the HTTP gateway calls into.

use std::sync::Arc;

use async_trait::async_trait;
use fleetgate_core::DeviceId;
use fleetgate_store::{Device, DeviceOrigin, DeviceStore};

use crate::client::{DeviceClient, HttpDeviceClient};
use crate::error::{ControlError, Result};
use crate::forward::Forwarder;
use crate::probe::ProbeEngine;
use crate::scheduler::SweepSchedule;
use crate::telemetry::{TelemetrySink, TracingTelemetry};
use crate::types::{
    AddDeviceRequest, ControlConfig, DiscoveryReport, ForwardOutcome, ForwardRequest,
    HealthCheckReport, UpdateDeviceRequest,
};

/// Trait defining the device control operations.
///
/// This trait provides the complete API for managing the registry, running
/// sweeps on demand, and forwarding requests.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    // =========================================================================
    // Registry
    // =========================================================================

    /// List all devices in registration order.
    async fn list_devices(&self) -> Vec<Device>;

    /// Get a device by ID.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DeviceNotFound` if the device doesn't exist.
    async fn get_device(&self, id: &DeviceId) -> Result<Device>;

    /// Register a device in the `Pending` state.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidRequest` for a blank address or name,
    /// `ControlError::InvalidId` for a malformed explicit ID, and
    /// `ControlError::DuplicateDevice` / `ControlError::AddressInUse` on
    /// conflicts.
    async fn add_device(&self, request: AddDeviceRequest) -> Result<Device>;

    /// Edit a device's address or descriptive fields.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DeviceNotFound` if the device doesn't exist.
    async fn update_device(&self, id: &DeviceId, request: UpdateDeviceRequest) -> Result<Device>;

    /// Remove a device.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DeviceNotFound` if the device doesn't exist.
    async fn remove_device(&self, id: &DeviceId) -> Result<()>;

    // =========================================================================
    // Sweeps
    // =========================================================================

    /// Run a discovery sweep now.
    async fn run_discovery(&self) -> DiscoveryReport;

    /// Run a health-check sweep now.
    async fn run_health_check(&self) -> HealthCheckReport;

    // =========================================================================
    // Forwarding
    // =========================================================================

    /// Forward a request to one device.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DeviceNotFound` if the device doesn't exist.
    async fn forward(&self, id: &DeviceId, request: ForwardRequest) -> Result<ForwardOutcome>;

    /// Query `/status` on every device.
    async fn forward_all_status(&self) -> Vec<ForwardOutcome>;
}

/// The main device control service implementation.
pub struct DeviceControlService<S: DeviceStore> {
    store: Arc<S>,
    engine: Arc<ProbeEngine<S>>,
    forwarder: Forwarder<S>,
    config: ControlConfig,
}

impl<S: DeviceStore> DeviceControlService<S> {
    /// Create a new service.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        client: Arc<dyn DeviceClient>,
        telemetry: Arc<dyn TelemetrySink>,
        config: ControlConfig,
    ) -> Self {
        let engine = Arc::new(ProbeEngine::new(
            store.clone(),
            client.clone(),
            telemetry.clone(),
            config.candidate_addresses.clone(),
        ));
        let forwarder = Forwarder::new(store.clone(), client, telemetry);
        Self {
            store,
            engine,
            forwarder,
            config,
        }
    }

    /// Create with the HTTP device client and tracing telemetry.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults(store: Arc<S>, config: ControlConfig) -> Result<Self> {
        let client = HttpDeviceClient::new(&config)?;
        Ok(Self::new(
            store,
            Arc::new(client),
            Arc::new(TracingTelemetry),
            config,
        ))
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The probe engine, for the background scheduler.
    #[must_use]
    pub fn engine(&self) -> Arc<ProbeEngine<S>> {
        self.engine.clone()
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Sweep periods derived from the configuration.
    #[must_use]
    pub fn sweep_schedule(&self) -> SweepSchedule {
        SweepSchedule {
            discovery: self.config.discovery_interval(),
            health_check: self.config.health_check_interval(),
        }
    }

    fn ensure_address_free(&self, address: &str, except: Option<&DeviceId>) -> Result<()> {
        match self.store.find_by_address(address) {
            Some(other) if Some(&other.id) != except => Err(ControlError::AddressInUse {
                address: address.to_string(),
                device_id: other.id,
            }),
            _ => Ok(()),
        }
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ControlError::InvalidRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Trim optional free-form text; blank means unset.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S: DeviceStore + 'static> DeviceControl for DeviceControlService<S> {
    // =========================================================================
    // Registry
    // =========================================================================

    async fn list_devices(&self) -> Vec<Device> {
        self.store.list()
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Device> {
        self.store
            .get(id)
            .ok_or_else(|| ControlError::DeviceNotFound(id.clone()))
    }

    async fn add_device(&self, request: AddDeviceRequest) -> Result<Device> {
        let address = required("address", &request.address)?;
        let name = required("name", &request.name)?;
        let id = match optional(request.id) {
            Some(explicit) => DeviceId::new(explicit)?,
            None => DeviceId::from_address(&address),
        };

        let mut device = Device::new(id, address, name, DeviceOrigin::Manual);
        device.location = optional(request.location);
        device.description = optional(request.description);
        self.store.insert_if_absent(device.clone())?;

        tracing::info!(
            device_id = %device.id,
            address = %device.address,
            name = %device.display_name,
            "Registered device"
        );
        Ok(device)
    }

    async fn update_device(&self, id: &DeviceId, request: UpdateDeviceRequest) -> Result<Device> {
        if self.store.get(id).is_none() {
            return Err(ControlError::DeviceNotFound(id.clone()));
        }

        let address = request
            .address
            .as_deref()
            .map(|a| required("address", a))
            .transpose()?;
        let name = request
            .name
            .as_deref()
            .map(|n| required("name", n))
            .transpose()?;
        if let Some(address) = &address {
            self.ensure_address_free(address, Some(id))?;
        }

        let location = request.location.map(|l| optional(Some(l)));
        let description = request.description.map(|d| optional(Some(d)));

        let device = self
            .store
            .update(id, &mut |device| {
                if let Some(address) = &address {
                    device.address.clone_from(address);
                }
                if let Some(name) = &name {
                    device.display_name.clone_from(name);
                }
                if let Some(location) = &location {
                    device.location.clone_from(location);
                }
                if let Some(description) = &description {
                    device.description.clone_from(description);
                }
            })
            .ok_or_else(|| ControlError::DeviceNotFound(id.clone()))?;

        tracing::info!(device_id = %id, "Updated device");
        Ok(device)
    }

    async fn remove_device(&self, id: &DeviceId) -> Result<()> {
        if !self.store.remove(id) {
            return Err(ControlError::DeviceNotFound(id.clone()));
        }
        tracing::info!(device_id = %id, "Removed device");
        Ok(())
    }

    // =========================================================================
    // Sweeps
    // =========================================================================

    async fn run_discovery(&self) -> DiscoveryReport {
        self.engine.discover().await
    }

    async fn run_health_check(&self) -> HealthCheckReport {
        self.engine.health_check().await
    }

    // =========================================================================
    // Forwarding
    // =========================================================================

    async fn forward(&self, id: &DeviceId, request: ForwardRequest) -> Result<ForwardOutcome> {
        self.forwarder.forward(id, &request).await
    }

    async fn forward_all_status(&self) -> Vec<ForwardOutcome> {
        self.forwarder.forward_all_status().await
    }
}
