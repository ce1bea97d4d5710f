//! Identity provider error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during sign-in, sign-up, and session restore.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] shopfront_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account already exists for the email.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password rejected by the provider.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The account has been disabled by an administrator.
    #[error("user disabled")]
    UserDisabled,

    /// The provider is throttling sign-in attempts for this account.
    #[error("too many attempts, try again later")]
    TooManyAttempts,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider is unreachable or not configured.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// Any other provider error code.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// The identity was created but its profile document could not be.
    #[error("account created but profile could not be saved: {0}")]
    ProfileProvisioning(#[source] StoreError),
}

impl AuthError {
    /// Short code used in redirect query strings (`?error=...`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail(_) => "invalid_email",
            Self::InvalidCredentials => "invalid_credentials",
            Self::UserAlreadyExists => "email_taken",
            Self::WeakPassword(_) => "weak_password",
            Self::UserDisabled => "disabled",
            Self::TooManyAttempts => "rate_limited",
            Self::ProfileProvisioning(_) => "profile",
            Self::Http(_) | Self::Unavailable(_) | Self::Provider(_) => "unavailable",
        }
    }
}
