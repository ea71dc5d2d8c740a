//! Gateway configuration types.
//!
//! Configuration is read from the environment at startup. Every variable is
//! optional except `JWT_SECRET`, which the production validator needs.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fleetgate_control::ControlConfig;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Configuration for the gateway service.
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Location of the device registry snapshot.
    #[serde(default = "GatewayConfig::default_registry_path")]
    pub registry_path: PathBuf,

    /// Shared secret for bearer token validation.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Probing and forwarding settings.
    #[serde(default)]
    pub control: ControlConfig,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    fn default_registry_path() -> PathBuf {
        PathBuf::from("./data/devices.json")
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a numeric variable cannot be parsed
    /// or is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a numeric variable cannot be parsed,
    /// or if a port, interval, multiplier or timeout is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(path) = lookup("REGISTRY_PATH") {
            config.registry_path = PathBuf::from(path);
        }
        config.jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty());
        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.cors_origins = split_list(&origins);
        }
        if let Some(addresses) = lookup("DEVICE_ADDRESSES") {
            config.control.candidate_addresses = split_list(&addresses);
        }

        let control = &mut config.control;
        if let Some(port) = parse_nonzero(&lookup, "DEVICE_PORT")? {
            control.device_port = port;
        }
        if let Some(secs) = parse_nonzero(&lookup, "DISCOVERY_INTERVAL_SECS")? {
            control.discovery_interval_secs = secs;
        }
        if let Some(multiplier) = parse_nonzero(&lookup, "HEALTH_CHECK_MULTIPLIER")? {
            control.health_check_multiplier = multiplier;
        }
        if let Some(ms) = parse_nonzero(&lookup, "PROBE_TIMEOUT_MS")? {
            control.probe_timeout_ms = ms;
        }
        if let Some(ms) = parse_nonzero(&lookup, "FORWARD_TIMEOUT_MS")? {
            control.forward_timeout_ms = ms;
        }

        Ok(config)
    }

    /// The token signing secret.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `JWT_SECRET` was not provided.
    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or(ConfigError::Missing("JWT_SECRET"))
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        })
}

fn parse_nonzero<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Default + PartialEq,
    T::Err: fmt::Display,
{
    match parse_var::<F, T>(lookup, var)? {
        Some(value) if value == T::default() => Err(ConfigError::Invalid {
            var,
            value: lookup(var).unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        }),
        parsed => Ok(parsed),
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            registry_path: Self::default_registry_path(),
            jwt_secret: None,
            control: ControlConfig::default(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("cors_origins", &self.cors_origins)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("registry_path", &self.registry_path)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("control", &self.control)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.registry_path, PathBuf::from("./data/devices.json"));
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.control.device_port, 5000);
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("REGISTRY_PATH", "/var/lib/fleetgate/devices.json"),
            ("JWT_SECRET", "s3cret"),
            ("DEVICE_ADDRESSES", "100.64.0.1, 100.64.0.2,,"),
            ("DEVICE_PORT", "8000"),
            ("DISCOVERY_INTERVAL_SECS", "15"),
            ("HEALTH_CHECK_MULTIPLIER", "4"),
            ("PROBE_TIMEOUT_MS", "1500"),
            ("FORWARD_TIMEOUT_MS", "2500"),
            ("CORS_ORIGINS", "https://app.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(
            config.registry_path,
            PathBuf::from("/var/lib/fleetgate/devices.json")
        );
        assert_eq!(config.jwt_secret().unwrap(), "s3cret");
        assert_eq!(
            config.control.candidate_addresses,
            vec!["100.64.0.1".to_string(), "100.64.0.2".to_string()]
        );
        assert_eq!(config.control.device_port, 8000);
        assert_eq!(config.control.discovery_interval(), Duration::from_secs(15));
        assert_eq!(config.control.health_check_interval(), Duration::from_secs(60));
        assert_eq!(config.control.probe_timeout_ms, 1500);
        assert_eq!(config.control.forward_timeout_ms, 2500);
        assert_eq!(config.cors_origins, vec!["https://app.example.com".to_string()]);
    }

    #[test]
    fn missing_secret_is_reported() {
        let config = GatewayConfig::from_lookup(lookup(&[("JWT_SECRET", "")])).unwrap();
        assert!(matches!(
            config.jwt_secret(),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = GatewayConfig::from_lookup(lookup(&[("DEVICE_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DEVICE_PORT", .. }));
    }

    #[test]
    fn zero_periods_are_rejected() {
        for var in [
            "DEVICE_PORT",
            "DISCOVERY_INTERVAL_SECS",
            "HEALTH_CHECK_MULTIPLIER",
            "PROBE_TIMEOUT_MS",
            "FORWARD_TIMEOUT_MS",
        ] {
            let err = GatewayConfig::from_lookup(lookup(&[(var, " 0 ")])).unwrap_err();
            match err {
                ConfigError::Invalid { var: rejected, reason, .. } => {
                    assert_eq!(rejected, var);
                    assert_eq!(reason, "must be greater than zero");
                }
                ConfigError::Missing(_) => panic!("expected {var} to be invalid"),
            }
        }

        let config = GatewayConfig::from_lookup(lookup(&[("DISCOVERY_INTERVAL_SECS", "1")])).unwrap();
        assert_eq!(config.control.discovery_interval_secs, 1);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = GatewayConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"listen_addr": "0.0.0.0:9090", "control": {"device_port": 7000}}"#)
                .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9090");
        assert_eq!(config.control.device_port, 7000);
        assert_eq!(config.control.probe_timeout_ms, 3_000);
        assert!(config.cors_origins.is_empty());
    }
}
