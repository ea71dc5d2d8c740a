//! Caller authentication for fleetgate.
//!
//! This crate turns a bearer token into an authenticated [`Identity`]. It is
//! the trust boundary of the gateway: once a token validates, the rest of
//! the system trusts the identity and its [`Role`] completely.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────────┐
//! │   Gateway        │────▶│  IdentityValidator  │
//! │   (HTTP)         │     │  (trait)            │
//! └──────────────────┘     └──────────┬──────────┘
//!                                     │
//!                   ┌─────────────────┴──────────────────┐
//!          ┌────────▼─────────┐              ┌───────────▼───────────┐
//!          │  HmacJwtValidator│              │ MockIdentityValidator │
//!          │  (HS256)         │              │ (tests / dev-mode)    │
//!          └──────────────────┘              └───────────────────────┘
//! ```
//!
//! Token issuance and credential storage live in the external login service
//! that shares the signing secret.
//!
//! # Example
//!
//! ```no_run
//! use fleetgate_auth::{AuthConfig, HmacJwtValidator, IdentityValidator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = HmacJwtValidator::new(AuthConfig::new("shared-secret"));
//!
//! // In a request handler:
//! let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...";
//! let identity = validator.validate(token).await?;
//!
//! println!("{} ({})", identity.email, identity.role);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod identity;
pub mod jwt;

pub use error::{AuthError, Result};
pub use identity::{Identity, Role};
pub use jwt::{HmacJwtValidator, IdentityValidator};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockIdentityValidator;

/// Configuration for token validation.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared HS256 signing secret.
    pub secret: String,
    /// Expected `iss` claim, if enforced.
    pub issuer: Option<String>,
    /// Expected `aud` claim, if enforced.
    pub audience: Option<String>,
    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Create a config with the given secret and default settings.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            audience: None,
            leeway_seconds: 30,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AuthConfig::new("s3cret");
        assert_eq!(config.secret, "s3cret");
        assert!(config.issuer.is_none());
        assert!(config.audience.is_none());
        assert_eq!(config.leeway_seconds, 30);
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", AuthConfig::new("s3cret"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::TokenExpired.http_status_code(), 401);
        assert_eq!(AuthError::InvalidSignature.http_status_code(), 401);
        assert_eq!(AuthError::MissingClaim("sub".into()).http_status_code(), 401);
        assert_eq!(AuthError::Internal("test".into()).http_status_code(), 500);
    }
}
