//! In-memory identity provider.
//!
//! Mirrors the observable behavior of the Firebase backend (error codes,
//! six-character password minimum, lookup returning `None` for unknown
//! tokens) without any network. Passwords are held in plain text, so this
//! backend is for local development and tests only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use uuid::Uuid;

use shopfront_core::{Email, UserId};

use super::{AuthError, AuthTokens, IdentityProvider, SignedInUser};
use crate::models::UserIdentity;

/// Minimum password length accepted at sign-up.
const MIN_PASSWORD_LENGTH: usize = 6;

struct Account {
    identity: UserIdentity,
    password: String,
}

/// Identity provider keeping accounts and issued tokens in memory.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    /// Accounts keyed by normalized email.
    accounts: RwLock<HashMap<String, Account>>,
    /// Live id tokens.
    tokens: RwLock<HashMap<String, UserId>>,
    unavailable: AtomicBool,
}

impl std::fmt::Debug for MemoryIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIdentityProvider")
            .field("unavailable", &self.unavailable.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MemoryIdentityProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly, bypassing password rules.
    ///
    /// Replaces any existing account with the same email.
    ///
    /// # Errors
    ///
    /// Returns an error if no user id could be generated.
    pub async fn with_user(
        &self,
        email: &Email,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserIdentity, AuthError> {
        let identity = UserIdentity {
            id: new_user_id()?,
            email: Some(email.clone()),
            display_name: display_name.map(str::to_owned),
        };
        self.accounts.write().await.insert(
            email.normalized(),
            Account {
                identity: identity.clone(),
                password: password.to_owned(),
            },
        );
        Ok(identity)
    }

    /// Make every subsequent call fail with `AuthError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Invalidate an issued id token, as if it had expired.
    pub async fn revoke(&self, id_token: &SecretString) {
        self.tokens.write().await.remove(id_token.expose_secret());
    }

    fn check_available(&self) -> Result<(), AuthError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::Unavailable(
                "memory provider switched off".to_owned(),
            ));
        }
        Ok(())
    }

    async fn issue_tokens(&self, user_id: &UserId) -> AuthTokens {
        let id_token = Uuid::new_v4().to_string();
        self.tokens
            .write()
            .await
            .insert(id_token.clone(), user_id.clone());
        AuthTokens {
            id_token: SecretString::from(id_token),
            refresh_token: SecretString::from(Uuid::new_v4().to_string()),
        }
    }
}

fn new_user_id() -> Result<UserId, AuthError> {
    UserId::parse(&Uuid::new_v4().simple().to_string())
        .map_err(|e| AuthError::Provider(format!("generated invalid user id: {e}")))
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignedInUser, AuthError> {
        self.check_available()?;

        let identity = {
            let accounts = self.accounts.read().await;
            match accounts.get(&email.normalized()) {
                Some(account) if account.password == password.expose_secret() => {
                    account.identity.clone()
                }
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        let tokens = self.issue_tokens(&identity.id).await;
        Ok(SignedInUser { identity, tokens })
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<SignedInUser, AuthError> {
        self.check_available()?;

        if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(format!(
                "Password should be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let identity = {
            let mut accounts = self.accounts.write().await;
            let key = email.normalized();
            if accounts.contains_key(&key) {
                return Err(AuthError::UserAlreadyExists);
            }
            let identity = UserIdentity {
                id: new_user_id()?,
                email: Some(email.clone()),
                display_name: display_name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned),
            };
            accounts.insert(
                key,
                Account {
                    identity: identity.clone(),
                    password: password.expose_secret().to_owned(),
                },
            );
            identity
        };

        let tokens = self.issue_tokens(&identity.id).await;
        Ok(SignedInUser { identity, tokens })
    }

    async fn sign_out(&self, tokens: &AuthTokens) -> Result<(), AuthError> {
        self.revoke(&tokens.id_token).await;
        Ok(())
    }

    async fn lookup(&self, id_token: &SecretString) -> Result<Option<UserIdentity>, AuthError> {
        self.check_available()?;

        let Some(user_id) = self.tokens.read().await.get(id_token.expose_secret()).cloned() else {
            return Ok(None);
        };
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| account.identity.id == user_id)
            .map(|account| account.identity.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = MemoryIdentityProvider::new();
        let created = provider
            .sign_up(&email("new@example.com"), &secret("hunter22"), Some(" New "))
            .await
            .unwrap();
        assert_eq!(created.identity.display_name.as_deref(), Some("New"));

        let signed_in = provider
            .sign_in_with_password(&email("NEW@example.com"), &secret("hunter22"))
            .await
            .unwrap();
        assert_eq!(signed_in.identity.id, created.identity.id);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email() {
        let provider = MemoryIdentityProvider::new();
        provider
            .with_user(&email("a@example.com"), "right-pass", None)
            .await
            .unwrap();

        let wrong = provider
            .sign_in_with_password(&email("a@example.com"), &secret("wrong-pass"))
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let unknown = provider
            .sign_in_with_password(&email("b@example.com"), &secret("right-pass"))
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_sign_up_rules() {
        let provider = MemoryIdentityProvider::new();
        let weak = provider
            .sign_up(&email("a@example.com"), &secret("12345"), None)
            .await;
        assert!(matches!(weak, Err(AuthError::WeakPassword(_))));

        provider
            .sign_up(&email("a@example.com"), &secret("123456"), None)
            .await
            .unwrap();
        let dup = provider
            .sign_up(&email("A@Example.com"), &secret("123456"), None)
            .await;
        assert!(matches!(dup, Err(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_lookup_and_sign_out() {
        let provider = MemoryIdentityProvider::new();
        provider
            .with_user(&email("a@example.com"), "password", Some("A"))
            .await
            .unwrap();
        let user = provider
            .sign_in_with_password(&email("a@example.com"), &secret("password"))
            .await
            .unwrap();

        let found = provider.lookup(&user.tokens.id_token).await.unwrap();
        assert_eq!(found, Some(user.identity.clone()));

        provider.sign_out(&user.tokens).await.unwrap();
        assert!(provider.lookup(&user.tokens.id_token).await.unwrap().is_none());
        assert!(provider.lookup(&secret("garbage")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let provider = MemoryIdentityProvider::new();
        provider.set_unavailable(true);
        assert!(matches!(
            provider.lookup(&secret("x")).await,
            Err(AuthError::Unavailable(_))
        ));
    }
}
