//! JWT validation and identity extraction.
//!
//! This module provides the core validation logic: signature verification,
//! expiry and optional issuer/audience checks, then claims to [`Identity`].

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::identity::{Identity, Role};
use crate::AuthConfig;

/// Trait for turning a bearer token into an identity.
#[async_trait]
pub trait IdentityValidator: Send + Sync {
    /// Validate a token and extract the caller identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or cannot be validated.
    async fn validate(&self, token: &str) -> Result<Identity>;
}

/// Raw claims from a JWT before conversion.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: Role,
}

/// HS256 JWT validator using a shared secret.
pub struct HmacJwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl HmacJwtValidator {
    /// Create a validator from the given configuration.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = config.leeway_seconds;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityValidator for HmacJwtValidator {
    async fn validate(&self, token: &str) -> Result<Identity> {
        let token_data = decode::<RawClaims>(token, &self.key, &self.validation).map_err(|e| {
            let err = match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
                _ => AuthError::InvalidToken(e.to_string()),
            };
            tracing::debug!(error = %err, "Token rejected");
            err
        })?;

        let claims = token_data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::MissingClaim("sub".to_string()));
        }

        Ok(Identity {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        })
    }
}

/// A mock identity validator for testing.
///
/// This validator accepts any token in the format `test-token:<role>:<user>`
/// and builds the identity from it, with email `<user>@test.local`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockIdentityValidator;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl IdentityValidator for MockIdentityValidator {
    async fn validate(&self, token: &str) -> Result<Identity> {
        let rest = token.strip_prefix("test-token:").ok_or_else(|| {
            AuthError::InvalidToken("expected test-token:<role>:<user>".to_string())
        })?;

        let Some((role, user)) = rest.split_once(':') else {
            return Err(AuthError::InvalidToken(
                "expected test-token:<role>:<user>".to_string(),
            ));
        };
        if user.is_empty() {
            return Err(AuthError::MissingClaim("sub".to_string()));
        }

        let role = if role == "admin" { Role::Admin } else { Role::User };
        Ok(Identity {
            id: user.to_string(),
            email: format!("{user}@test.local"),
            name: user.to_string(),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "unit-test-secret";

    fn sign(claims: &serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn exp_in(seconds: i64) -> i64 {
        chrono::Utc::now().timestamp() + seconds
    }

    #[tokio::test]
    async fn hmac_validator_accepts_valid_token() {
        let validator = HmacJwtValidator::new(AuthConfig::new(SECRET));
        let token = sign(
            &json!({
                "sub": "user-1",
                "email": "ops@example.com",
                "name": "Ops",
                "role": "admin",
                "exp": exp_in(3600),
            }),
            SECRET,
        );

        let identity = validator.validate(&token).await.unwrap();
        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.email, "ops@example.com");
        assert_eq!(identity.name, "Ops");
        assert!(identity.is_admin());
    }

    #[tokio::test]
    async fn hmac_validator_defaults_role_to_user() {
        let validator = HmacJwtValidator::new(AuthConfig::new(SECRET));
        let token = sign(&json!({"sub": "user-2", "exp": exp_in(60)}), SECRET);

        let identity = validator.validate(&token).await.unwrap();
        assert_eq!(identity.role, Role::User);
    }

    #[tokio::test]
    async fn hmac_validator_rejects_wrong_secret() {
        let validator = HmacJwtValidator::new(AuthConfig::new(SECRET));
        let token = sign(&json!({"sub": "user-1", "exp": exp_in(60)}), "other-secret");

        let result = validator.validate(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn hmac_validator_rejects_expired() {
        let validator = HmacJwtValidator::new(AuthConfig::new(SECRET));
        let token = sign(&json!({"sub": "user-1", "exp": exp_in(-3600)}), SECRET);

        let result = validator.validate(&token).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn hmac_validator_requires_exp() {
        let validator = HmacJwtValidator::new(AuthConfig::new(SECRET));
        let token = sign(&json!({"sub": "user-1"}), SECRET);

        let result = validator.validate(&token).await;
        assert!(matches!(result, Err(AuthError::MissingClaim(_))));
    }

    #[tokio::test]
    async fn hmac_validator_checks_issuer() {
        let mut config = AuthConfig::new(SECRET);
        config.issuer = Some("https://login.example.com".to_string());
        let validator = HmacJwtValidator::new(config);

        let token = sign(
            &json!({"sub": "user-1", "exp": exp_in(60), "iss": "https://evil.example.com"}),
            SECRET,
        );
        let result = validator.validate(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidIssuer)));
    }

    #[tokio::test]
    async fn hmac_validator_rejects_garbage() {
        let validator = HmacJwtValidator::new(AuthConfig::new(SECRET));
        let result = validator.validate("not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn mock_validator_works() {
        let validator = MockIdentityValidator;

        let admin = validator.validate("test-token:admin:alice").await.unwrap();
        assert!(admin.is_admin());
        assert_eq!(admin.email, "alice@test.local");

        let user = validator.validate("test-token:user:bob").await.unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.id, "bob");
    }

    #[tokio::test]
    async fn mock_validator_rejects_invalid() {
        let validator = MockIdentityValidator;
        assert!(validator.validate("invalid-token").await.is_err());
        assert!(validator.validate("test-token:admin").await.is_err());
        assert!(validator.validate("test-token:admin:").await.is_err());
    }
}
