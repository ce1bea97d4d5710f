//! Admin authorization.
//!
//! Decides whether a user is an administrator by reading their profile
//! document. Profiles whose email is in the [`AdminDirectory`] but whose
//! `role` is not yet `admin` are promoted on read (self-healing promotion).
//!
//! The promotion is an unconditional merge with no transaction. Two
//! concurrent promotions of the same user both write `role = admin`; the
//! store keeps whichever lands last, and the outcome is the same because
//! nothing here ever downgrades a role.

mod directory;
mod error;

pub use directory::AdminDirectory;
pub use error::{GrantError, VerificationError};

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use shopfront_core::{Role, UserId};

use crate::db::ProfileRepository;

/// Resolves and grants administrator privileges.
#[derive(Clone)]
pub struct AuthorizationResolver {
    profiles: ProfileRepository,
    directory: Arc<AdminDirectory>,
}

impl AuthorizationResolver {
    #[must_use]
    pub fn new(profiles: ProfileRepository, directory: Arc<AdminDirectory>) -> Self {
        Self {
            profiles,
            directory,
        }
    }

    /// The allow-list in use.
    #[must_use]
    pub fn directory(&self) -> &AdminDirectory {
        &self.directory
    }

    /// Whether the user is an administrator. Never fails.
    ///
    /// Any store failure is logged and resolves to `false`.
    pub async fn is_admin(&self, user_id: Option<&UserId>) -> bool {
        match self.verify(user_id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                tracing::warn!(
                    user_id = user_id.map(UserId::as_str),
                    error = %e,
                    "Admin verification failed, treating as non-admin"
                );
                false
            }
        }
    }

    /// Resolve admin status, surfacing store failures.
    ///
    /// Writes to the store only when promoting an eligible profile.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError` if the profile cannot be read or the
    /// promotion cannot be written.
    #[instrument(skip(self), fields(user_id = user_id.map(UserId::as_str)))]
    pub async fn verify(&self, user_id: Option<&UserId>) -> Result<bool, VerificationError> {
        let Some(user_id) = user_id else {
            return Ok(false);
        };

        let Some(profile) = self
            .profiles
            .get(user_id)
            .await
            .map_err(VerificationError::Read)?
        else {
            tracing::debug!("No profile document");
            return Ok(false);
        };

        if profile.is_admin() {
            return Ok(true);
        }

        let listed = profile
            .email
            .as_ref()
            .is_some_and(|email| self.directory.contains(email));
        if !listed {
            return Ok(false);
        }

        self.profiles
            .set_role(user_id, &Role::Admin, Utc::now())
            .await
            .map_err(VerificationError::Promote)?;
        tracing::info!(user_id = %user_id, "Promoted listed user to admin");
        Ok(true)
    }

    /// Grant admin privileges to `target` on behalf of `caller`.
    ///
    /// The caller must itself resolve as an administrator.
    ///
    /// # Errors
    ///
    /// Returns `GrantError::Forbidden` if the caller is not an admin (or
    /// their status cannot be verified), `GrantError::TargetNotFound` if the
    /// target has no profile, and `GrantError::Store` on write failure.
    #[instrument(skip(self), fields(caller = %caller, target = %target))]
    pub async fn grant_admin_privileges(
        &self,
        caller: &UserId,
        target: &UserId,
    ) -> Result<(), GrantError> {
        if !self.is_admin(Some(caller)).await {
            tracing::warn!("Rejected admin grant from non-admin caller");
            return Err(GrantError::Forbidden);
        }
        self.grant_trusted(target).await?;
        tracing::info!("Admin privileges granted");
        Ok(())
    }

    /// Grant admin privileges without checking a caller.
    ///
    /// For operator tooling that runs with service credentials outside any
    /// user session.
    ///
    /// # Errors
    ///
    /// Returns `GrantError::TargetNotFound` if the target has no profile and
    /// `GrantError::Store` on read or write failure.
    pub async fn grant_trusted(&self, target: &UserId) -> Result<(), GrantError> {
        if self.profiles.get(target).await?.is_none() {
            return Err(GrantError::TargetNotFound(target.to_string()));
        }
        self.profiles
            .set_role(target, &Role::Admin, Utc::now())
            .await?;
        Ok(())
    }
}
