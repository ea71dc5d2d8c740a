//! Device control for fleetgate.
//!
//! This crate holds the business logic behind the gateway: registry
//! management, the discovery and health-check sweeps, and request
//! forwarding. Every exchange with a device doubles as a liveness
//! observation recorded in the store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gateway (HTTP)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   DeviceControlService                      │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Registry   │ │ ProbeEngine │ │     Forwarder       │    │
//! │  │    CRUD     │ │  (sweeps)   │ │                     │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  ▲                   │
//!          ▼                  │                   ▼
//!   ┌─────────────┐   ┌───────────────┐   ┌──────────────┐
//!   │ DeviceStore │   │ProbeScheduler │   │ DeviceClient │
//!   │   (JSON)    │   │   (timers)    │   │    (HTTP)    │
//!   └─────────────┘   └───────────────┘   └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleetgate_control::{
//!     AddDeviceRequest, ControlConfig, DeviceControl, DeviceControlService, ProbeScheduler,
//! };
//! use fleetgate_store::JsonFileStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(JsonFileStore::open("./data/devices.json"));
//! let control = DeviceControlService::with_defaults(store, ControlConfig::default())?;
//!
//! let device = control
//!     .add_device(AddDeviceRequest::new("100.64.0.7", "Lobby screen"))
//!     .await?;
//! println!("Registered {}", device.id);
//!
//! let scheduler = ProbeScheduler::start(control.engine(), control.sweep_schedule());
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! See the [`lifecycle`] module for the status rules.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod forward;
pub mod lifecycle;
pub mod probe;
pub mod scheduler;
pub mod service;
pub mod telemetry;
pub mod types;

pub use client::{DeviceClient, HttpDeviceClient, HEALTH_PATH};
pub use error::{ControlError, DeviceError, DeviceErrorKind, Result};
pub use forward::{Forwarder, STATUS_PATH};
pub use probe::ProbeEngine;
pub use scheduler::{ProbeScheduler, SweepSchedule};
pub use service::{DeviceControl, DeviceControlService};
pub use telemetry::{ObservationSource, TelemetrySink, TracingTelemetry};
pub use types::{
    AddDeviceRequest, ControlConfig, DeviceResponse, DeviceSummary, DiscoveryAction,
    DiscoveryReport, DiscoveryResult, ForwardFailure, ForwardOutcome, ForwardRequest,
    HealthCheckReport, HealthCheckResult, HealthReport, ProbeResponse, UpdateDeviceRequest,
};

#[cfg(any(test, feature = "test-utils"))]
pub use client::mock::MockDeviceClient;
#[cfg(any(test, feature = "test-utils"))]
pub use telemetry::recording::{RecordingTelemetry, TelemetryEvent};

// Re-export commonly used types from dependencies for convenience
pub use fleetgate_core::DeviceId;
pub use fleetgate_store::{Device, DeviceOrigin, DeviceStatus};
