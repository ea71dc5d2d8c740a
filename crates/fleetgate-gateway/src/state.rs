//! Gateway application state.
//!
//! One [`GatewayState`] is shared by every handler behind an `Arc`. It holds
//! the fleet control surface, the token validator, and the configuration the
//! gateway was started with.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fleetgate_auth::IdentityValidator;
use fleetgate_control::DeviceControl;

use crate::config::GatewayConfig;

/// Shared state for the gateway handlers.
pub struct GatewayState<C, V>
where
    C: DeviceControl,
    V: IdentityValidator,
{
    /// Registry, sweeps and forwarding.
    pub control: Arc<C>,
    /// Bearer token validator.
    pub validator: Arc<V>,
    /// Gateway configuration.
    pub config: GatewayConfig,
    started_at: Instant,
}

impl<C, V> GatewayState<C, V>
where
    C: DeviceControl,
    V: IdentityValidator,
{
    /// Create the state; the uptime clock starts now.
    #[must_use]
    pub fn new(control: Arc<C>, validator: Arc<V>, config: GatewayConfig) -> Self {
        Self {
            control,
            validator,
            config,
            started_at: Instant::now(),
        }
    }

    /// Time since the state was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
