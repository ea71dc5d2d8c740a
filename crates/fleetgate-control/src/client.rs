//! HTTP client for talking to devices.
//!
//! This module provides the `DeviceClient` trait used by the probe engine and
//! the forwarder, and the reqwest-backed `HttpDeviceClient`. Every call
//! carries a fixed deadline; a device that does not answer in time is a
//! [`DeviceError::Timeout`], never a hang.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ControlError, DeviceError, Result};
use crate::types::{ControlConfig, DeviceResponse, ForwardRequest, HealthReport, ProbeResponse};

/// Path of the device health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Trait for device communication.
///
/// This trait abstracts the transport, allowing for mock implementations in
/// tests.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Probe the device's health endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be reached in time, answers with
    /// a non-2xx status, or reports `success: false`.
    async fn probe(&self, address: &str) -> std::result::Result<ProbeResponse, DeviceError>;

    /// Relay a request to the device.
    ///
    /// Any HTTP status from the device is a successful exchange.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    async fn send(
        &self,
        address: &str,
        request: &ForwardRequest,
    ) -> std::result::Result<DeviceResponse, DeviceError>;
}

/// reqwest-backed device client.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    client: reqwest::Client,
    device_port: u16,
    probe_timeout: Duration,
    forward_timeout: Duration,
}

impl HttpDeviceClient {
    /// Create a client using the ports and deadlines from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ControlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.probe_timeout())
            .build()
            .map_err(|e| ControlError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a device client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &ControlConfig) -> Self {
        Self {
            client,
            device_port: config.device_port,
            probe_timeout: config.probe_timeout(),
            forward_timeout: config.forward_timeout(),
        }
    }

    /// Build the URL for `path` on the device at `address`.
    ///
    /// Addresses may be a bare host, `host:port`, or a full `http(s)://` base.
    /// The default device port is used when none is given.
    #[must_use]
    pub fn url(&self, address: &str, path: &str) -> String {
        let address = address.trim().trim_end_matches('/');
        let base = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", authority(address, self.device_port))
        };

        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    async fn read_body(
        response: reqwest::Response,
        deadline: Duration,
    ) -> std::result::Result<serde_json::Value, DeviceError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&e, deadline))?;
        Ok(parse_body(&bytes))
    }
}

/// Authority part of a device URL, adding the default port when the address
/// carries none. Bare IPv6 addresses are bracketed.
fn authority(address: &str, default_port: u16) -> String {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(ip)) => format!("[{ip}]:{default_port}"),
        Ok(IpAddr::V4(ip)) => format!("{ip}:{default_port}"),
        Err(_) if has_port(address) => address.to_string(),
        Err(_) => format!("{address}:{default_port}"),
    }
}

fn has_port(address: &str) -> bool {
    let Some((host, port)) = address.rsplit_once(':') else {
        return false;
    };
    // An unbracketed host with more colons is not `host:port`.
    (host.starts_with('[') || !host.contains(':')) && port.parse::<u16>().is_ok()
}

/// Parse a device body: JSON when possible, otherwise the text as a JSON string.
fn parse_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn map_reqwest_error(err: &reqwest::Error, deadline: Duration) -> DeviceError {
    if err.is_timeout() {
        DeviceError::Timeout {
            after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }
    } else if err.is_connect() {
        DeviceError::Connect(err.to_string())
    } else {
        DeviceError::Transport(err.to_string())
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn probe(&self, address: &str) -> std::result::Result<ProbeResponse, DeviceError> {
        let url = self.url(address, HEALTH_PATH);

        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, self.probe_timeout))?;

        let status = response.status();
        let body = Self::read_body(response, self.probe_timeout).await?;
        let health = HealthReport::from_body(&body);

        if !status.is_success() || health.success == Some(false) {
            tracing::debug!(address = %address, status = %status, "Device reported unhealthy");
            return Err(DeviceError::Unhealthy {
                status: status.as_u16(),
                body: Some(body),
            });
        }

        Ok(ProbeResponse {
            status: status.as_u16(),
            body,
            health,
        })
    }

    async fn send(
        &self,
        address: &str,
        request: &ForwardRequest,
    ) -> std::result::Result<DeviceResponse, DeviceError> {
        let url = self.url(address, &request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .timeout(self.forward_timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, self.forward_timeout))?;

        let status = response.status().as_u16();
        let body = Self::read_body(response, self.forward_timeout).await?;

        Ok(DeviceResponse { status, body })
    }
}

/// Scriptable device client for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use super::DeviceClient;
    use crate::error::DeviceError;
    use crate::types::{DeviceResponse, ForwardRequest, HealthReport, ProbeResponse};

    #[derive(Debug, Clone)]
    enum Behavior {
        Healthy { health: Value, reply: Option<(u16, Value)> },
        Failing(DeviceError),
    }

    /// A device client that answers from an in-memory script.
    ///
    /// Addresses that were never scripted fail with a connection error.
    #[derive(Debug, Default)]
    pub struct MockDeviceClient {
        devices: Mutex<HashMap<String, Behavior>>,
        delay: Mutex<Option<Duration>>,
        sent: Mutex<Vec<(String, ForwardRequest)>>,
        probe_calls: AtomicUsize,
        send_calls: AtomicUsize,
    }

    impl MockDeviceClient {
        /// Create a client with no scripted devices.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a healthy device whose health endpoint returns `health`.
        ///
        /// Forwarded requests are answered with `200` and an echo of the request.
        #[must_use]
        pub fn with_device(self, address: &str, health: Value) -> Self {
            self.set_healthy(address, health);
            self
        }

        /// Make `address` healthy.
        pub fn set_healthy(&self, address: &str, health: Value) {
            self.devices.lock().insert(
                address.to_string(),
                Behavior::Healthy {
                    health,
                    reply: None,
                },
            );
        }

        /// Make `address` answer forwarded requests with a fixed reply.
        pub fn set_reply(&self, address: &str, status: u16, body: Value) {
            let mut devices = self.devices.lock();
            let health = match devices.remove(address) {
                Some(Behavior::Healthy { health, .. }) => health,
                _ => json!({"success": true}),
            };
            devices.insert(
                address.to_string(),
                Behavior::Healthy {
                    health,
                    reply: Some((status, body)),
                },
            );
        }

        /// Make every call to `address` fail with `error`.
        pub fn set_failing(&self, address: &str, error: DeviceError) {
            self.devices
                .lock()
                .insert(address.to_string(), Behavior::Failing(error));
        }

        /// Make every call to `address` fail with a connection error.
        pub fn set_unreachable(&self, address: &str) {
            self.set_failing(address, DeviceError::Connect("connection refused".to_string()));
        }

        /// Delay every call by `delay` before answering.
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock() = Some(delay);
        }

        /// Number of probes issued.
        pub fn probe_calls(&self) -> usize {
            self.probe_calls.load(Ordering::SeqCst)
        }

        /// Number of forwarded requests issued.
        pub fn send_calls(&self) -> usize {
            self.send_calls.load(Ordering::SeqCst)
        }

        /// Every forwarded request, in order, with its target address.
        pub fn sent(&self) -> Vec<(String, ForwardRequest)> {
            self.sent.lock().clone()
        }

        fn behavior(&self, address: &str) -> Behavior {
            self.devices.lock().get(address).cloned().unwrap_or_else(|| {
                Behavior::Failing(DeviceError::Connect("connection refused".to_string()))
            })
        }

        async fn pause(&self) {
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl DeviceClient for MockDeviceClient {
        async fn probe(&self, address: &str) -> Result<ProbeResponse, DeviceError> {
            self.probe_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;

            match self.behavior(address) {
                Behavior::Healthy { health, .. } => Ok(ProbeResponse {
                    status: 200,
                    health: HealthReport::from_body(&health),
                    body: health,
                }),
                Behavior::Failing(err) => Err(err),
            }
        }

        async fn send(
            &self,
            address: &str,
            request: &ForwardRequest,
        ) -> Result<DeviceResponse, DeviceError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.sent
                .lock()
                .push((address.to_string(), request.clone()));
            self.pause().await;

            match self.behavior(address) {
                Behavior::Healthy {
                    reply: Some((status, body)),
                    ..
                } => Ok(DeviceResponse { status, body }),
                Behavior::Healthy { reply: None, .. } => Ok(DeviceResponse {
                    status: 200,
                    body: json!({
                        "address": address,
                        "method": request.method.as_str(),
                        "path": request.path,
                    }),
                }),
                Behavior::Failing(err) => Err(err),
            }
        }
    }
}
