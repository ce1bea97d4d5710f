//! Remote identity provider.
//!
//! Credentials never touch this service's storage: the provider verifies
//! passwords and issues tokens, and we keep only the tokens in the session.
//!
//! # Backends
//!
//! - [`FirebaseAuthClient`] - Firebase Authentication (Identity Toolkit REST)
//! - [`MemoryIdentityProvider`] - in-process accounts for local development
//!   and tests

mod error;
mod firebase;
mod memory;

pub use error::AuthError;
pub use firebase::FirebaseAuthClient;
pub use memory::MemoryIdentityProvider;

use async_trait::async_trait;
use secrecy::SecretString;

use shopfront_core::Email;

use crate::models::UserIdentity;

/// Tokens issued by the identity provider for one signed-in user.
#[derive(Clone)]
pub struct AuthTokens {
    /// Short-lived token identifying the user.
    pub id_token: SecretString,
    /// Long-lived token for obtaining new id tokens.
    pub refresh_token: SecretString,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens").finish_non_exhaustive()
    }
}

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone)]
pub struct SignedInUser {
    pub identity: UserIdentity,
    pub tokens: AuthTokens,
}

/// Operations the storefront needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an email/password pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for unknown emails or wrong
    /// passwords, and other variants for provider failures.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignedInUser, AuthError>;

    /// Create a new account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is taken and
    /// `AuthError::WeakPassword` if the provider rejects the password.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<SignedInUser, AuthError>;

    /// End the provider-side session for these tokens, if the provider has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the request.
    async fn sign_out(&self, tokens: &AuthTokens) -> Result<(), AuthError>;

    /// Resolve an id token to the identity it belongs to.
    ///
    /// Returns `Ok(None)` for expired, revoked, or unknown tokens.
    ///
    /// # Errors
    ///
    /// Returns an error only when the provider cannot answer.
    async fn lookup(&self, id_token: &SecretString) -> Result<Option<UserIdentity>, AuthError>;
}
