//! Authenticated caller identity.

use serde::{Deserialize, Serialize};

/// Caller role.
///
/// Only `admin` is distinguished. Any other role string deserializes to
/// [`Role::User`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May perform every operation.
    Admin,
    /// May list devices and perform read-only forwards.
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    /// Lowercase name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user identifier (the token subject).
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Granted role.
    pub role: Role,
}

impl Identity {
    /// Whether the caller may perform administrative operations.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_are_users() {
        let role: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, Role::User);
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn admin_check() {
        let mut identity = Identity {
            id: "u1".into(),
            email: "a@example.com".into(),
            name: "A".into(),
            role: Role::User,
        };
        assert!(!identity.is_admin());
        identity.role = Role::Admin;
        assert!(identity.is_admin());
    }
}
