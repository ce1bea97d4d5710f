//! Admin privilege management commands.
//!
//! These run with the service credentials from the environment, outside any
//! user session, so grants here skip the caller check that the web route
//! enforces.
//!
//! # Usage
//!
//! ```bash
//! # Grant admin privileges to an existing user
//! shopfront-cli admin grant --user 5fX2kq9Lm3
//!
//! # Resolve a user's admin status (promotes listed users, like a sign-in would)
//! shopfront-cli admin check --user 5fX2kq9Lm3
//! ```
//!
//! # Environment Variables
//!
//! The document store variables of the storefront: `SHOPFRONT_BACKEND`,
//! `FIREBASE_PROJECT_ID`, `FIRESTORE_ACCESS_TOKEN`, and
//! `FIRESTORE_EMULATOR_HOST`. No identity provider key is needed.

use std::sync::Arc;

use shopfront_core::{UserIdError, UserId};
use shopfront_storefront::config::{ConfigError, DocumentStoreConfig};
use shopfront_storefront::db::ProfileRepository;
use shopfront_storefront::services::{
    AdminDirectory, AuthorizationResolver, GrantError, VerificationError,
};
use shopfront_storefront::state::Backends;
use shopfront_storefront::store::StoreError;
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Backend configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The document store client could not be created.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The user id argument is malformed.
    #[error("Invalid user id: {0}")]
    InvalidUserId(#[from] UserIdError),

    /// Grant failed.
    #[error("Grant failed: {0}")]
    Grant(#[from] GrantError),

    /// Admin status could not be resolved.
    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),
}

fn resolver() -> Result<AuthorizationResolver, AdminError> {
    let config = DocumentStoreConfig::from_env()?;
    if matches!(config, DocumentStoreConfig::Memory) {
        tracing::warn!("SHOPFRONT_BACKEND=memory: changes will be lost when this command exits");
    }

    let documents = Backends::documents_from_config(&config)?;
    Ok(AuthorizationResolver::new(
        ProfileRepository::new(documents),
        Arc::new(AdminDirectory::from_build()),
    ))
}

/// Grant admin privileges to an existing user.
///
/// # Errors
///
/// Returns `AdminError` if the backend is misconfigured, the user has no
/// profile, or the write fails.
pub async fn grant(user: &str) -> Result<(), AdminError> {
    let user_id = UserId::parse(user)?;
    let resolver = resolver()?;

    tracing::info!("Granting admin privileges to {}", user_id);
    resolver.grant_trusted(&user_id).await?;
    tracing::info!("User {} is now an admin", user_id);

    Ok(())
}

/// Resolve a user's admin status.
///
/// # Errors
///
/// Returns `AdminError` if the backend is misconfigured or the profile
/// cannot be read or promoted.
pub async fn check(user: &str) -> Result<bool, AdminError> {
    let user_id = UserId::parse(user)?;
    let resolver = resolver()?;

    let is_admin = resolver.verify(Some(&user_id)).await?;
    if is_admin {
        tracing::info!("User {} is an admin", user_id);
    } else {
        tracing::info!("User {} is not an admin", user_id);
    }
    tracing::info!(
        "Admin directory has {} listed email(s)",
        resolver.directory().len()
    );

    Ok(is_admin)
}
