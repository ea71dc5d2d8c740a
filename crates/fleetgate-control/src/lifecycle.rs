//! Device status rules.
//!
//! ```text
//!   admin add                 discovery / health check / forward ok
//!  ──────────► ┌─────────┐ ─────────────────────────────────────────┐
//!              │ Pending │                                          ▼
//!              └────┬────┘                                   ┌────────────┐
//!                   │ health check / forward failed          │   Online   │
//!                   ▼                                        └─────┬──────┘
//!              ┌─────────┐   any probe or forward failed           │
//!              │ Offline │ ◄───────────────────────────────────────┘
//!              └────┬────┘
//!                   │ any probe or forward ok
//!                   └──────────────────────────────► Online
//! ```
//!
//! A failed *discovery* probe only demotes a device that was online; pending
//! and offline devices are left as they are.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetgate_core::DeviceId;
use fleetgate_store::{DeviceStatus, DeviceStore, StatusUpdate};

use crate::telemetry::{ObservationSource, TelemetrySink};

/// Status after a health check or forward.
#[must_use]
pub const fn after_observation(reachable: bool) -> DeviceStatus {
    if reachable {
        DeviceStatus::Online
    } else {
        DeviceStatus::Offline
    }
}

/// Status after a discovery probe of an existing device, or `None` to leave
/// the device untouched.
#[must_use]
pub const fn after_discovery(current: DeviceStatus, reachable: bool) -> Option<DeviceStatus> {
    match (current, reachable) {
        (_, true) => Some(DeviceStatus::Online),
        (DeviceStatus::Online, false) => Some(DeviceStatus::Offline),
        (DeviceStatus::Pending | DeviceStatus::Offline, false) => None,
    }
}

/// Write an observation to the store and report it.
///
/// Emits a status-change event only when the observation was applied and
/// moved the device to a new status.
pub(crate) fn record_observation<S: DeviceStore + ?Sized>(
    store: &S,
    telemetry: &dyn TelemetrySink,
    id: &DeviceId,
    status: DeviceStatus,
    observed_at: DateTime<Utc>,
    latency_ms: Option<u64>,
    source: ObservationSource,
) -> Option<StatusUpdate> {
    let update = store.set_status(id, status, observed_at, latency_ms)?;
    if update.changed() {
        telemetry.status_changed(&update.device, Some(update.previous), source);
    }
    Some(update)
}

/// [`record_observation`] on the blocking pool.
///
/// The snapshot write stays off the async workers, and the observation is
/// still stored before this returns.
pub(crate) async fn record_observation_blocking<S: DeviceStore + 'static>(
    store: &Arc<S>,
    telemetry: &Arc<dyn TelemetrySink>,
    id: &DeviceId,
    status: DeviceStatus,
    observed_at: DateTime<Utc>,
    latency_ms: Option<u64>,
    source: ObservationSource,
) -> Option<StatusUpdate> {
    let (store, telemetry, id) = (Arc::clone(store), Arc::clone(telemetry), id.clone());
    let write = tokio::task::spawn_blocking(move || {
        record_observation(&*store, &*telemetry, &id, status, observed_at, latency_ms, source)
    });
    match write.await {
        Ok(update) => update,
        Err(e) => {
            tracing::error!(error = %e, "Status write task failed");
            None
        }
    }
}
