//! Background sweep scheduling.
//!
//! `ProbeScheduler` owns two tokio tasks, one per sweep, each driven by its
//! own interval. Both share a [`CancellationToken`]. Cancelling stops new
//! sweeps from being scheduled; a sweep already running is allowed to finish,
//! which is bounded by the probe timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fleetgate_store::DeviceStore;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::probe::ProbeEngine;

/// Periods for the two sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    /// Discovery period.
    pub discovery: Duration,
    /// Health-check period.
    pub health_check: Duration,
}

/// Handle to the running sweep tasks.
pub struct ProbeScheduler {
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ProbeScheduler {
    /// Spawn both sweep loops.
    ///
    /// The first sweep of each kind runs one full period after start; run the
    /// startup discovery explicitly before calling this.
    #[must_use]
    pub fn start<S>(engine: Arc<ProbeEngine<S>>, schedule: SweepSchedule) -> Self
    where
        S: DeviceStore + 'static,
    {
        let cancel = CancellationToken::new();

        let discovery = {
            let engine = engine.clone();
            tokio::spawn(run_periodic(
                "discovery",
                schedule.discovery,
                cancel.clone(),
                move || {
                    let engine = engine.clone();
                    async move {
                        engine.discover().await;
                    }
                },
            ))
        };

        let health_check = tokio::spawn(run_periodic(
            "health_check",
            schedule.health_check,
            cancel.clone(),
            move || {
                let engine = engine.clone();
                async move {
                    engine.health_check().await;
                }
            },
        ));

        tracing::info!(
            discovery_secs = schedule.discovery.as_secs(),
            health_check_secs = schedule.health_check.as_secs(),
            "Probe scheduler started"
        );

        Self {
            cancel,
            tasks: Mutex::new(vec![discovery, health_check]),
        }
    }

    /// Stop scheduling new sweeps. Safe to call more than once.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Stopping probe scheduler");
            self.cancel.cancel();
        }
    }

    /// Whether the scheduler has not been stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop and wait for both loops to exit.
    ///
    /// Returns once any in-flight sweep has finished. Later calls return
    /// immediately.
    pub async fn shutdown(&self) {
        self.stop();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Sweep task failed");
            }
        }
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_periodic<F, Fut>(name: &'static str, period: Duration, cancel: CancellationToken, mut sweep: F)
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tracing::debug!(sweep = name, "Running scheduled sweep");
                sweep().await;
            }
        }
    }

    tracing::debug!(sweep = name, "Sweep loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockDeviceClient;
    use crate::telemetry::recording::RecordingTelemetry;
    use fleetgate_store::{DeviceStatus, JsonFileStore};
    use serde_json::json;

    fn setup(client: MockDeviceClient) -> (Arc<JsonFileStore>, Arc<MockDeviceClient>, Arc<ProbeEngine<JsonFileStore>>) {
        let store = Arc::new(JsonFileStore::in_memory());
        let client = Arc::new(client);
        let engine = Arc::new(ProbeEngine::new(
            store.clone(),
            client.clone(),
            Arc::new(RecordingTelemetry::new()),
            vec!["100.64.0.1".to_string()],
        ));
        (store, client, engine)
    }

    fn schedule(discovery_ms: u64, multiplier: u32) -> SweepSchedule {
        SweepSchedule {
            discovery: Duration::from_millis(discovery_ms),
            health_check: Duration::from_millis(discovery_ms) * multiplier,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_run_on_their_own_periods() {
        let (store, client, engine) =
            setup(MockDeviceClient::new().with_device("100.64.0.1", json!({"success": true})));
        let scheduler = ProbeScheduler::start(engine, schedule(1_000, 2));

        // Nothing runs before the first period.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(client.probe_calls(), 0);

        // t=1s: discovery. t=2s: discovery + health check.
        tokio::time::sleep(Duration::from_millis(1_600)).await;
        assert_eq!(client.probe_calls(), 3);
        assert_eq!(store.list()[0].status, DeviceStatus::Online);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_sweeps() {
        let (_store, client, engine) =
            setup(MockDeviceClient::new().with_device("100.64.0.1", json!({"success": true})));
        let scheduler = ProbeScheduler::start(engine, schedule(1_000, 2));

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(client.probe_calls(), 0);

        scheduler.shutdown().await;
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_lets_in_flight_sweep_finish() {
        let client = MockDeviceClient::new().with_device("100.64.0.1", json!({"success": true}));
        client.set_delay(Duration::from_millis(800));
        let (store, client, engine) = setup(client);
        let scheduler = ProbeScheduler::start(engine, schedule(1_000, 10));

        // Discovery starts at t=1s and is blocked in the probe until t=1.8s.
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(client.probe_calls(), 1);
        assert!(store.is_empty());

        scheduler.shutdown().await;

        // The sweep completed instead of being aborted.
        assert_eq!(store.len(), 1);
        assert_eq!(client.probe_calls(), 1);
    }
}
