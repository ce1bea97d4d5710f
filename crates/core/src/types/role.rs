//! User roles stored on profile documents.

use serde::{Deserialize, Serialize};

/// Role recorded on a user profile.
///
/// Only `admin` carries meaning. Any other stored value is kept verbatim in
/// [`Role::Other`] so that reading and re-writing a profile never loses data
/// written by another process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Administrator with access to the admin dashboard.
    Admin,
    /// Any other role value found in the store.
    Other(String),
}

impl Role {
    /// Wire value for the administrator role.
    pub const ADMIN: &'static str = "admin";

    /// Returns `true` for the administrator role.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns the stored string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => Self::ADMIN,
            Self::Other(value) => value,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        if value == Self::ADMIN {
            Self::Admin
        } else {
            Self::Other(value)
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => Role::ADMIN.to_owned(),
            Role::Other(value) => value,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
