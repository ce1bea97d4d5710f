//! User domain types.
//!
//! [`UserIdentity`] is owned by the remote identity provider and only cached
//! here for the lifetime of a session. [`UserProfile`] is the record kept in
//! the document store under the `users` collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{Email, Role, UserId};

/// A signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Opaque identifier issued by the identity provider.
    pub id: UserId,
    /// Email address, when the provider knows one.
    pub email: Option<Email>,
    /// Display name chosen at sign-up.
    pub display_name: Option<String>,
}

impl UserIdentity {
    /// Name to greet the user with: display name, then email, then id.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.email.as_ref().map(Email::as_str))
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// A user profile document (domain type).
///
/// Created at sign-up with no role. The authorization resolver may later set
/// `role` to admin; nothing in this crate deletes profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Email copied from the identity at sign-up. `None` when the stored
    /// value is missing or not an email.
    pub email: Option<Email>,
    /// Display name copied from sign-up.
    pub display_name: Option<String>,
    /// Role, absent for regular customers.
    pub role: Option<Role>,
    /// When the profile was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the profile was last changed by this system.
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Build the profile written at sign-up time.
    #[must_use]
    pub const fn new(email: Email, display_name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            email: Some(email),
            display_name,
            role: None,
            created_at: Some(now),
            updated_at: None,
        }
    }

    /// Whether the stored role is exactly admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_ref().is_some_and(Role::is_admin)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn identity(display_name: Option<&str>, email: Option<&str>) -> UserIdentity {
        UserIdentity {
            id: UserId::parse("u1").unwrap(),
            email: email.map(|e| Email::parse(e).unwrap()),
            display_name: display_name.map(str::to_owned),
        }
    }

    #[test]
    fn test_greeting_name_fallbacks() {
        assert_eq!(
            identity(Some("Kishore"), Some("k@x.com")).greeting_name(),
            "Kishore"
        );
        assert_eq!(identity(Some("  "), Some("k@x.com")).greeting_name(), "k@x.com");
        assert_eq!(identity(None, None).greeting_name(), "u1");
    }

    #[test]
    fn test_new_profile_has_no_role() {
        let profile = UserProfile::new(Email::parse("a@b.com").unwrap(), None, Utc::now());
        assert!(profile.role.is_none());
        assert!(!profile.is_admin());
        assert!(profile.created_at.is_some());
        assert!(profile.updated_at.is_none());
    }

    #[test]
    fn test_is_admin_requires_admin_role() {
        let mut profile = UserProfile::new(Email::parse("a@b.com").unwrap(), None, Utc::now());
        profile.role = Some(Role::from("affiliate"));
        assert!(!profile.is_admin());
        profile.role = Some(Role::Admin);
        assert!(profile.is_admin());
    }
}
