//! Authentication extractors.
//!
//! `AuthUser` validates the `Authorization: Bearer <token>` header and yields
//! the caller identity. `AdminUser` additionally requires the admin role.
//! Everything downstream trusts the extracted identity.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::Method;

use fleetgate_auth::{Identity, IdentityValidator};
use fleetgate_control::DeviceControl;

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated caller of any role.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl AuthUser {
    /// Fail with `Forbidden` unless the caller may forward `method`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` for a mutating method and a non-admin caller.
    pub fn authorize_forward(&self, method: &Method) -> Result<(), ApiError> {
        if requires_admin(method) && !self.0.is_admin() {
            tracing::info!(
                user_id = %self.0.id,
                method = %method,
                "Rejected mutating forward from non-admin"
            );
            return Err(ApiError::Forbidden(format!(
                "{method} requests to devices require the admin role"
            )));
        }
        Ok(())
    }
}

/// Whether forwarding `method` is an administrative operation.
///
/// Only `GET` and `HEAD` are open to every authenticated role.
#[must_use]
pub fn requires_admin(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)
}

impl<C, V> FromRequestParts<Arc<GatewayState<C, V>>> for AuthUser
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<GatewayState<C, V>>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = bearer_token(parts)?;
            let identity = state.validator.validate(token).await?;
            Ok(Self(identity))
        })
    }
}

impl<C, V> FromRequestParts<Arc<GatewayState<C, V>>> for AdminUser
where
    C: DeviceControl + 'static,
    V: IdentityValidator + 'static,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<GatewayState<C, V>>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
            if !identity.is_admin() {
                tracing::info!(user_id = %identity.id, "Rejected admin request");
                return Err(ApiError::Forbidden("admin role required".to_string()));
            }
            Ok(Self(identity))
        })
    }
}
