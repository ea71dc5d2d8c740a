//! Core types and utilities for fleetgate.
//!
//! This crate provides the foundational types used throughout the gateway:
//!
//! - **Identifiers**: the strongly-typed [`DeviceId`]
//! - **Error types**: [`IdError`] for identifier validation
//!
//! # Example
//!
//! ```
//! use fleetgate_core::DeviceId;
//!
//! // Derive an ID from an overlay address
//! let id = DeviceId::from_address("100.64.0.7");
//! assert_eq!(id.as_str(), "100-64-0-7");
//!
//! // Or validate an explicitly assigned one
//! let explicit = DeviceId::new("kitchen-display").unwrap();
//! assert_eq!(explicit.to_string(), "kitchen-display");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{DeviceId, IdError};
