//! Authorization error types.

use thiserror::Error;

use crate::store::StoreError;

/// Failure while resolving admin status.
///
/// Never shown to users: the gate maps it to a generic message and
/// [`super::AuthorizationResolver::is_admin`] maps it to `false`.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Reading the profile document failed.
    #[error("failed to read profile: {0}")]
    Read(#[source] StoreError),

    /// Writing the self-healing promotion failed.
    #[error("failed to promote profile: {0}")]
    Promote(#[source] StoreError),
}

/// Failure while granting admin privileges.
#[derive(Debug, Error)]
pub enum GrantError {
    /// The caller is not an administrator (or could not be verified as one).
    #[error("caller is not an administrator")]
    Forbidden,

    /// The target user has no profile document.
    #[error("no profile for user {0}")]
    TargetNotFound(String),

    /// The document store failed.
    #[error("document store error: {0}")]
    Store(#[from] StoreError),
}
