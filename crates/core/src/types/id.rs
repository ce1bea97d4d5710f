//! Opaque user identifiers.
//!
//! User IDs are issued by the remote identity provider. We never interpret
//! them; we only guarantee they are non-empty so an "absent" user can't be
//! smuggled in as an empty string.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`UserId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UserIdError {
    /// The input string is empty or whitespace.
    #[error("user id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("user id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a path separator.
    #[error("user id cannot contain '/'")]
    InvalidCharacter,
}

/// Identifier of a user in the remote identity provider.
///
/// Also used as the document key for the user's profile, which is why `/` is
/// rejected: document stores treat it as a path separator.
///
/// ```
/// use shopfront_core::UserId;
///
/// assert!(UserId::parse("u1").is_ok());
/// assert!(UserId::parse("").is_err());
/// assert!(UserId::parse("users/u1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Maximum length of a user id (Firebase caps UIDs at 128 characters).
    pub const MAX_LENGTH: usize = 128;

    /// Parse a `UserId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or contains `/`.
    pub fn parse(s: &str) -> Result<Self, UserIdError> {
        if s.trim().is_empty() {
            return Err(UserIdError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(UserIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.contains('/') {
            return Err(UserIdError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Parse an optional, possibly empty input into an optional `UserId`.
    ///
    /// Empty or invalid input maps to `None`.
    #[must_use]
    pub fn parse_optional(s: Option<&str>) -> Option<Self> {
        s.and_then(|s| Self::parse(s).ok())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `UserId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(UserId::parse("u1").unwrap().as_str(), "u1");
        assert!(UserId::parse("Xk2lq9ZyA1bC3dE4fG5hI6jK7lM8").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(UserId::parse(""), Err(UserIdError::Empty));
        assert_eq!(UserId::parse("   "), Err(UserIdError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(129);
        assert!(matches!(
            UserId::parse(&long),
            Err(UserIdError::TooLong { max: 128 })
        ));
    }

    #[test]
    fn test_parse_rejects_path_separator() {
        assert_eq!(
            UserId::parse("users/u1"),
            Err(UserIdError::InvalidCharacter)
        );
    }

    #[test]
    fn test_parse_optional() {
        assert!(UserId::parse_optional(None).is_none());
        assert!(UserId::parse_optional(Some("")).is_none());
        assert_eq!(
            UserId::parse_optional(Some("u2")).unwrap().as_str(),
            "u2"
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let id: UserId = serde_json::from_str("\"u3\"").unwrap();
        assert_eq!(id.as_str(), "u3");
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }
}
