//! HTTP gateway for the fleetgate device fleet.
//!
//! This crate provides the public-facing API in front of the devices. It
//! handles:
//!
//! - Bearer token authentication and role checks
//! - Device listing and bulk status queries
//! - Request forwarding to individual devices
//! - Administrative registry edits and on-demand sweeps
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │                        (HTTP)                               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    fleetgate-gateway                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │   Router    │ │    Admin            │    │
//! │  │  Extractors │ │  + Handlers │ │    Handlers         │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ Device   │   │  Auth    │   │ Devices  │
//!        │ Control  │   │ (JWT)    │   │ (overlay)│
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleetgate_auth::{AuthConfig, HmacJwtValidator};
//! use fleetgate_control::{ControlConfig, DeviceControlService};
//! use fleetgate_gateway::{create_router, GatewayConfig, GatewayState};
//! use fleetgate_store::JsonFileStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(JsonFileStore::open("./data/devices.json"));
//! let control = Arc::new(DeviceControlService::with_defaults(store, ControlConfig::default())?);
//! let validator = Arc::new(HmacJwtValidator::new(AuthConfig::new("shared-secret")));
//!
//! let state = GatewayState::new(control, validator, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

// Re-export key types for convenience
pub use auth::{AdminUser, AuthUser};
