//! Device identifier type.
//!
//! Device IDs are short, URL-safe strings. They are either derived from the
//! device's overlay network address or assigned explicitly by an operator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a device identifier.
pub const MAX_ID_LEN: usize = 64;

/// A validated device identifier.
///
/// Valid IDs are 1 to [`MAX_ID_LEN`] characters of ASCII alphanumerics,
/// `-` or `_`, which keeps them safe to embed in URL paths.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and wrap an explicitly assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty, too long, or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn new(s: impl Into<String>) -> Result<Self, IdError> {
        let s = s.into();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.len() > MAX_ID_LEN {
            return Err(IdError::TooLong {
                max: MAX_ID_LEN,
                got: s.len(),
            });
        }
        if let Some(c) = s.chars().find(|c| !is_id_char(*c)) {
            return Err(IdError::InvalidChar(c));
        }
        Ok(Self(s))
    }

    /// Derive an identifier from a network address.
    ///
    /// Separators (`.` and `:`) become `-`, and any other character outside
    /// the allowed set is dropped. The same address always maps to the same ID.
    #[must_use]
    pub fn from_address(address: &str) -> Self {
        let mut id: String = address
            .trim()
            .chars()
            .filter_map(|c| match c {
                '.' | ':' => Some('-'),
                c if is_id_char(c) => Some(c),
                _ => None,
            })
            .collect();
        id.truncate(MAX_ID_LEN);
        if id.is_empty() {
            id.push_str("device");
        }
        Self(id)
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input string is empty.
    #[error("identifier is empty")]
    Empty,

    /// The input is longer than allowed.
    #[error("identifier too long: max {max} characters, got {got}")]
    TooLong {
        /// The maximum number of characters.
        max: usize,
        /// The actual number of characters.
        got: usize,
    },

    /// The input contains a character outside the allowed set.
    #[error("invalid character in identifier: {0:?}")]
    InvalidChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_address_substitutes_separators() {
        assert_eq!(DeviceId::from_address("100.64.0.7").as_str(), "100-64-0-7");
        assert_eq!(
            DeviceId::from_address("pi-kitchen.tailnet:5000").as_str(),
            "pi-kitchen-tailnet-5000"
        );
    }

    #[test]
    fn from_address_is_deterministic() {
        assert_eq!(
            DeviceId::from_address("10.0.0.1"),
            DeviceId::from_address("10.0.0.1")
        );
    }

    #[test]
    fn from_address_never_empty() {
        assert_eq!(DeviceId::from_address("///").as_str(), "device");
    }

    #[test]
    fn explicit_id_validation() {
        assert!(DeviceId::new("lobby_screen-2").is_ok());
        assert_eq!(DeviceId::new(""), Err(IdError::Empty));
        assert_eq!(DeviceId::new("a/b"), Err(IdError::InvalidChar('/')));
        assert!(matches!(
            DeviceId::new("x".repeat(65)),
            Err(IdError::TooLong { max: 64, got: 65 })
        ));
    }

    #[test]
    fn device_id_serde_json() {
        let id = DeviceId::new("pi-01").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"pi-01\"");
        let parsed: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);

        let bad: Result<DeviceId, _> = serde_json::from_str("\"bad id\"");
        assert!(bad.is_err());
    }
}
