//! Session-related types.
//!
//! Values stored in the cookie session between requests. The identity itself
//! is never stored; it is re-resolved from the tokens on every request.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::identity::AuthTokens;

/// Identity provider tokens as persisted in the session store.
///
/// The session store is in-process memory, so plain strings are acceptable
/// here; they are converted back into [`AuthTokens`] before use.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredTokens {
    id_token: String,
    refresh_token: String,
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl From<&AuthTokens> for StoredTokens {
    fn from(tokens: &AuthTokens) -> Self {
        Self {
            id_token: tokens.id_token.expose_secret().to_owned(),
            refresh_token: tokens.refresh_token.expose_secret().to_owned(),
        }
    }
}

impl From<StoredTokens> for AuthTokens {
    fn from(stored: StoredTokens) -> Self {
        Self {
            id_token: SecretString::from(stored.id_token),
            refresh_token: SecretString::from(stored.refresh_token),
        }
    }
}

/// One-shot, user-visible message shown on the next page render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashMessage {
    /// The signed-in user is not an administrator.
    InsufficientPrivileges,
    /// Admin verification failed for technical reasons.
    VerificationFailed,
    /// The user signed out.
    SignedOut,
}

impl FlashMessage {
    /// Text shown to the user.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::InsufficientPrivileges => {
                "You do not have sufficient privileges to access the admin area."
            }
            Self::VerificationFailed => {
                "There was an error verifying your admin access. Please try again."
            }
            Self::SignedOut => "You have been signed out.",
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for the identity provider tokens of the signed-in user.
    pub const AUTH_TOKENS: &str = "auth_tokens";

    /// Key for the pending flash message.
    pub const FLASH: &str = "flash";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_tokens_debug_redacts() {
        let tokens = AuthTokens {
            id_token: SecretString::from("id-token-value"),
            refresh_token: SecretString::from("refresh-token-value"),
        };
        let stored = StoredTokens::from(&tokens);
        let debug_output = format!("{stored:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("id-token-value"));
        assert!(!debug_output.contains("refresh-token-value"));
    }

    #[test]
    fn test_stored_tokens_convert_back() {
        let tokens = AuthTokens {
            id_token: SecretString::from("a"),
            refresh_token: SecretString::from("b"),
        };
        let restored = AuthTokens::from(StoredTokens::from(&tokens));
        assert_eq!(restored.id_token.expose_secret(), "a");
        assert_eq!(restored.refresh_token.expose_secret(), "b");
    }

    #[test]
    fn test_flash_messages_are_distinct() {
        assert_ne!(
            FlashMessage::InsufficientPrivileges.text(),
            FlashMessage::VerificationFailed.text()
        );
        let json = serde_json::to_string(&FlashMessage::VerificationFailed).unwrap();
        assert_eq!(json, "\"verification_failed\"");
    }
}
