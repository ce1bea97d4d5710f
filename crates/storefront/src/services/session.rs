//! Session provider.
//!
//! Holds the identity of the current user for one session context and
//! publishes it on a `watch` channel. State only changes through identity
//! events processed by a single listener task, so callers of
//! [`SessionProvider::sign_in`] and friends observe the new identity
//! asynchronously, never as a direct result of the call.
//!
//! In the HTTP layer one provider is built per request and restored from the
//! tokens kept in the cookie session.

use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::instrument;

use shopfront_core::Email;

use crate::db::ProfileRepository;
use crate::identity::{AuthError, AuthTokens, IdentityProvider};
use crate::models::{UserIdentity, UserProfile};

/// Current identity and whether the first identity event is still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// `true` until the first identity event arrives.
    pub loading: bool,
    /// Signed-in user, if any.
    pub identity: Option<UserIdentity>,
}

impl SessionSnapshot {
    /// Initial state before any identity event.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            loading: true,
            identity: None,
        }
    }

    /// Settled state with the given identity.
    #[must_use]
    pub const fn settled(identity: Option<UserIdentity>) -> Self {
        Self {
            loading: false,
            identity,
        }
    }
}

/// Session context over a remote identity provider.
pub struct SessionProvider {
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileRepository,
    events: mpsc::UnboundedSender<Option<UserIdentity>>,
    state: watch::Receiver<SessionSnapshot>,
    listener: JoinHandle<()>,
}

impl std::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProvider")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionProvider {
    /// Create a provider in the loading state and start its listener.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: ProfileRepository) -> Self {
        let (state_tx, state) = watch::channel(SessionSnapshot::loading());
        let (events, mut events_rx) = mpsc::unbounded_channel::<Option<UserIdentity>>();

        let listener = tokio::spawn(async move {
            while let Some(identity) = events_rx.recv().await {
                tracing::debug!(
                    user_id = identity.as_ref().map(|i| i.id.as_str()),
                    "Identity changed"
                );
                state_tx.send_replace(SessionSnapshot::settled(identity));
            }
        });

        Self {
            identity,
            profiles,
            events,
            state,
            listener,
        }
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Signed-in user, if known yet.
    #[must_use]
    pub fn current_identity(&self) -> Option<UserIdentity> {
        self.state.borrow().identity.clone()
    }

    /// Whether the first identity event is still pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Wait for the first identity event and return the settled state.
    ///
    /// If the listener has stopped, the session is treated as signed out.
    pub async fn settled(&self) -> SessionSnapshot {
        let mut rx = self.state.clone();
        match rx.wait_for(|s| !s.loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => SessionSnapshot::settled(None),
        }
    }

    /// Resolve previously issued tokens and emit the first identity event.
    ///
    /// Expired or unknown tokens, and provider failures, all resolve to a
    /// signed-out session.
    #[instrument(skip_all, fields(has_tokens = tokens.is_some()))]
    pub async fn restore(&self, tokens: Option<&AuthTokens>) {
        let identity = match tokens {
            Some(tokens) => match self.identity.lookup(&tokens.id_token).await {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to restore session, treating as signed out");
                    None
                }
            },
            None => None,
        };
        self.notify(identity);
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the provider rejects the credentials or cannot
    /// be reached.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthTokens, AuthError> {
        let user = self.identity.sign_in_with_password(email, password).await?;
        tracing::info!(user_id = %user.identity.id, "User signed in");
        self.notify(Some(user.identity));
        Ok(user.tokens)
    }

    /// Create an account and its profile document.
    ///
    /// The profile is written with no role and `createdAt` set to now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the identity cannot be created, or
    /// `AuthError::ProfileProvisioning` if the identity was created but the
    /// profile write failed. The identity is not rolled back in that case.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<AuthTokens, AuthError> {
        let user = self.identity.sign_up(email, password, display_name).await?;
        let user_id = user.identity.id.clone();
        let profile = UserProfile::new(
            user.identity.email.clone().unwrap_or_else(|| email.clone()),
            user.identity.display_name.clone(),
            Utc::now(),
        );
        self.notify(Some(user.identity));

        if let Err(e) = self.profiles.create(&user_id, &profile).await {
            tracing::error!(user_id = %user_id, error = %e, "Identity created but profile write failed");
            return Err(AuthError::ProfileProvisioning(e));
        }

        tracing::info!(user_id = %user_id, "User registered");
        Ok(user.tokens)
    }

    /// Sign out.
    ///
    /// The session is cleared even if the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the provider rejects the sign-out.
    #[instrument(skip_all)]
    pub async fn log_out(&self, tokens: Option<&AuthTokens>) -> Result<(), AuthError> {
        let result = match tokens {
            Some(tokens) => self.identity.sign_out(tokens).await,
            None => Ok(()),
        };
        self.notify(None);
        result
    }

    fn notify(&self, identity: Option<UserIdentity>) {
        if self.events.send(identity).is_err() {
            tracing::debug!("Session listener stopped, dropping identity event");
        }
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopfront_core::UserId;

    use crate::db::USERS_COLLECTION;
    use crate::identity::MemoryIdentityProvider;
    use crate::store::MemoryDocumentStore;

    struct Fixture {
        identity: Arc<MemoryIdentityProvider>,
        store: Arc<MemoryDocumentStore>,
        provider: SessionProvider,
    }

    fn fixture() -> Fixture {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let store = Arc::new(MemoryDocumentStore::new());
        let provider = SessionProvider::new(
            identity.clone(),
            ProfileRepository::new(store.clone()),
        );
        Fixture {
            identity,
            store,
            provider,
        }
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[tokio::test]
    async fn test_starts_loading() {
        let f = fixture();
        assert!(f.provider.is_loading());
        assert!(f.provider.current_identity().is_none());
        assert_eq!(*f.provider.subscribe().borrow(), SessionSnapshot::loading());
    }

    #[tokio::test]
    async fn test_restore_without_tokens_settles_signed_out() {
        let f = fixture();
        f.provider.restore(None).await;
        assert_eq!(f.provider.settled().await, SessionSnapshot::settled(None));
    }

    #[tokio::test]
    async fn test_restore_with_valid_tokens() {
        let f = fixture();
        let identity = f
            .identity
            .with_user(&email("a@example.com"), "password", None)
            .await
            .unwrap();
        let tokens = f
            .identity
            .sign_in_with_password(&email("a@example.com"), &secret("password"))
            .await
            .unwrap()
            .tokens;

        f.provider.restore(Some(&tokens)).await;
        assert_eq!(f.provider.settled().await.identity, Some(identity));
    }

    #[tokio::test]
    async fn test_restore_with_provider_down_settles_signed_out() {
        let f = fixture();
        f.identity.set_unavailable(true);
        let tokens = AuthTokens {
            id_token: secret("id"),
            refresh_token: secret("refresh"),
        };
        f.provider.restore(Some(&tokens)).await;
        assert!(f.provider.settled().await.identity.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_publishes_identity() {
        let f = fixture();
        f.identity
            .with_user(&email("a@example.com"), "password", Some("A"))
            .await
            .unwrap();
        let mut rx = f.provider.subscribe();

        f.provider
            .sign_in(&email("a@example.com"), &secret("password"))
            .await
            .unwrap();

        let snapshot = rx.wait_for(|s| s.identity.is_some()).await.unwrap().clone();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.identity.unwrap().display_name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_sign_in_failure_leaves_state_alone() {
        let f = fixture();
        let result = f
            .provider
            .sign_in(&email("nobody@example.com"), &secret("password"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert!(f.provider.is_loading());
    }

    #[tokio::test]
    async fn test_sign_up_provisions_profile() {
        let f = fixture();
        f.provider
            .sign_up(&email("new@example.com"), &secret("password"), Some("New"))
            .await
            .unwrap();

        let identity = f.provider.settled().await.identity.unwrap();
        let doc = f
            .store
            .snapshot(USERS_COLLECTION, identity.id.as_str())
            .await
            .unwrap();
        assert_eq!(doc.get_str("email"), Some("new@example.com"));
        assert_eq!(doc.get_str("displayName"), Some("New"));
        assert!(doc.get("role").is_none());
        assert!(doc.get_timestamp("createdAt").is_some());
    }

    #[tokio::test]
    async fn test_sign_up_profile_failure_keeps_identity() {
        let f = fixture();
        f.store.fail_writes(true);

        let result = f
            .provider
            .sign_up(&email("new@example.com"), &secret("password"), None)
            .await;
        assert!(matches!(result, Err(AuthError::ProfileProvisioning(_))));

        // The remote identity was not rolled back
        let again = f
            .identity
            .sign_in_with_password(&email("new@example.com"), &secret("password"))
            .await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_sign_up_rejected_writes_nothing() {
        let f = fixture();
        let result = f
            .provider
            .sign_up(&email("new@example.com"), &secret("123"), None)
            .await;
        assert!(matches!(result, Err(AuthError::WeakPassword(_))));
        assert_eq!(f.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_log_out_clears_identity() {
        let f = fixture();
        f.identity
            .with_user(&email("a@example.com"), "password", None)
            .await
            .unwrap();
        let tokens = f
            .provider
            .sign_in(&email("a@example.com"), &secret("password"))
            .await
            .unwrap();
        let mut rx = f.provider.subscribe();
        rx.wait_for(|s| s.identity.is_some()).await.unwrap();

        f.provider.log_out(Some(&tokens)).await.unwrap();
        rx.wait_for(|s| s.identity.is_none()).await.unwrap();

        // Tokens are no longer accepted by the provider
        assert!(f.identity.lookup(&tokens.id_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drop_stops_listener() {
        let f = fixture();
        let mut rx = f.provider.subscribe();
        drop(f.provider);
        assert!(rx.changed().await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_ids_are_provider_ids() {
        let f = fixture();
        let created = f
            .identity
            .with_user(&email("a@example.com"), "password", None)
            .await
            .unwrap();
        f.provider
            .sign_in(&email("a@example.com"), &secret("password"))
            .await
            .unwrap();
        let id: UserId = f.provider.settled().await.identity.unwrap().id;
        assert_eq!(id, created.id);
    }
}
