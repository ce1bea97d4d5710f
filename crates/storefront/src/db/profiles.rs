//! User profile repository.
//!
//! Maps [`UserProfile`] to and from documents in the `users` collection.
//! Field names follow the camelCase layout other clients of the same project
//! already read: `email`, `displayName`, `role`, `createdAt`, `updatedAt`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use shopfront_core::{Email, Role, UserId};

use crate::models::UserProfile;
use crate::store::{Document, DocumentStore, FieldValue, Fields, StoreError};

/// Collection holding one profile per user.
pub const USERS_COLLECTION: &str = "users";

mod field {
    pub const EMAIL: &str = "email";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const ROLE: &str = "role";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Key used by the readiness probe. Never written.
const PROBE_KEY: &str = "__readiness_probe__";

/// Repository for user profile documents.
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProfileRepository {
    /// Create a repository over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Get the profile of a user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read fails or the document is malformed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let document = self.store.get(USERS_COLLECTION, user_id.as_str()).await?;
        Ok(document.as_ref().map(profile_from_document))
    }

    /// Create (or replace) the profile of a newly registered user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    #[instrument(skip(self, profile), fields(user_id = %user_id))]
    pub async fn create(&self, user_id: &UserId, profile: &UserProfile) -> Result<(), StoreError> {
        self.store
            .set(
                USERS_COLLECTION,
                user_id.as_str(),
                profile_to_document(profile),
            )
            .await
    }

    /// Set the role of a user, touching only `role` and `updatedAt`.
    ///
    /// Creates the document if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write fails.
    #[instrument(skip(self), fields(user_id = %user_id, role = %role))]
    pub async fn set_role(
        &self,
        user_id: &UserId,
        role: &Role,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut fields = Fields::new();
        fields.insert(field::ROLE.to_owned(), FieldValue::from(role.as_str()));
        fields.insert(field::UPDATED_AT.to_owned(), FieldValue::from(now));
        self.store
            .merge(USERS_COLLECTION, user_id.as_str(), fields)
            .await
    }

    /// Check that the store answers reads.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be reached.
    pub async fn probe(&self) -> Result<(), StoreError> {
        self.store.get(USERS_COLLECTION, PROBE_KEY).await.map(|_| ())
    }
}

fn profile_from_document(document: &Document) -> UserProfile {
    UserProfile {
        // Profiles written by other clients may hold anything here
        email: document
            .get_str(field::EMAIL)
            .and_then(|s| Email::parse(s).ok()),
        display_name: document.get_str(field::DISPLAY_NAME).map(str::to_owned),
        role: document.get_str(field::ROLE).map(Role::from),
        created_at: document.get_timestamp(field::CREATED_AT),
        updated_at: document.get_timestamp(field::UPDATED_AT),
    }
}

fn profile_to_document(profile: &UserProfile) -> Document {
    let mut document = Document::new();
    if let Some(email) = &profile.email {
        document = document.with(field::EMAIL, email.as_str());
    }
    if let Some(name) = &profile.display_name {
        document = document.with(field::DISPLAY_NAME, name.as_str());
    }
    if let Some(role) = &profile.role {
        document = document.with(field::ROLE, role.as_str());
    }
    if let Some(created_at) = profile.created_at {
        document = document.with(field::CREATED_AT, created_at);
    }
    if let Some(updated_at) = profile.updated_at {
        document = document.with(field::UPDATED_AT, updated_at);
    }
    document
}
