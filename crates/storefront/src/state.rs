//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{BackendConfig, DocumentStoreConfig, StorefrontConfig};
use crate::db::ProfileRepository;
use crate::identity::{AuthError, FirebaseAuthClient, IdentityProvider, MemoryIdentityProvider};
use crate::services::{AdminDirectory, AuthorizationResolver, SessionProvider};
use crate::store::{DocumentStore, FirestoreClient, MemoryDocumentStore, StoreError};

/// Error creating the remote collaborators.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("identity provider: {0}")]
    Identity(#[from] AuthError),
    #[error("document store: {0}")]
    Store(#[from] StoreError),
}

/// The two remote collaborators, behind their traits.
#[derive(Clone)]
pub struct Backends {
    pub identity: Arc<dyn IdentityProvider>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Backends {
    /// Build the collaborators selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a Firebase client cannot be constructed.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        match config {
            BackendConfig::Firebase(firebase) => Ok(Self {
                identity: Arc::new(FirebaseAuthClient::new(firebase)?),
                documents: Arc::new(FirestoreClient::new(&firebase.firestore)?),
            }),
            BackendConfig::Memory => {
                tracing::warn!("Using in-memory backends; accounts and profiles will not persist");
                Ok(Self::memory())
            }
        }
    }

    /// Build only the document store, for tools that never sign anyone in.
    ///
    /// # Errors
    ///
    /// Returns an error if the Firestore client cannot be constructed.
    pub fn documents_from_config(
        config: &DocumentStoreConfig,
    ) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match config {
            DocumentStoreConfig::Firestore(firestore) => {
                Ok(Arc::new(FirestoreClient::new(firestore)?))
            }
            DocumentStoreConfig::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
        }
    }

    /// Fresh in-memory collaborators.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            identity: Arc::new(MemoryIdentityProvider::new()),
            documents: Arc::new(MemoryDocumentStore::new()),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the remote collaborators and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileRepository,
    resolver: AuthorizationResolver,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `backends` - Identity provider and document store
    /// * `directory` - Admin allow-list (normally [`AdminDirectory::from_build`])
    #[must_use]
    pub fn new(config: StorefrontConfig, backends: Backends, directory: AdminDirectory) -> Self {
        let profiles = ProfileRepository::new(backends.documents);
        let resolver = AuthorizationResolver::new(profiles.clone(), Arc::new(directory));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                identity: backends.identity,
                profiles,
                resolver,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the profile repository.
    #[must_use]
    pub fn profiles(&self) -> &ProfileRepository {
        &self.inner.profiles
    }

    /// Get a reference to the authorization resolver.
    #[must_use]
    pub fn resolver(&self) -> &AuthorizationResolver {
        &self.inner.resolver
    }

    /// Build a session context for one request.
    ///
    /// The provider starts in the loading state; call
    /// [`SessionProvider::restore`] with the request's tokens to settle it.
    #[must_use]
    pub fn session_provider(&self) -> SessionProvider {
        SessionProvider::new(self.inner.identity.clone(), self.inner.profiles.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::FirestoreConfig;

    #[test]
    fn test_documents_from_config_builds_firestore_without_api_key() {
        let config = DocumentStoreConfig::Firestore(FirestoreConfig {
            project_id: "demo-shop".to_owned(),
            access_token: None,
            emulator_host: Some("127.0.0.1:8080".to_owned()),
        });
        assert!(Backends::documents_from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_documents_from_config_memory_starts_empty() {
        let documents = Backends::documents_from_config(&DocumentStoreConfig::Memory).unwrap();
        assert!(documents.get("users", "u1").await.unwrap().is_none());
    }
}
