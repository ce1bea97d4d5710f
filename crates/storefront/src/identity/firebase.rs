//! Firebase Authentication client.
//!
//! Uses the Identity Toolkit REST API with the project's web API key:
//!
//! - `accounts:signInWithPassword` - email/password sign-in
//! - `accounts:signUp` - account creation (followed by `accounts:update` to
//!   set the display name)
//! - `accounts:lookup` - resolve an id token to its account
//!
//! Firebase has no server-side logout for password sessions; signing out
//! only forgets the tokens locally.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use url::Url;

use shopfront_core::{Email, EmailError, UserId};

use super::{AuthError, AuthTokens, IdentityProvider, SignedInUser};
use crate::config::FirebaseConfig;
use crate::models::UserIdentity;

/// Production Identity Toolkit endpoint.
const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/";

/// Firebase Authentication REST client.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for FirebaseAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuthClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Response of `signInWithPassword` and `signUp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuthClient {
    /// Create a client for the configured project.
    ///
    /// When `FIREBASE_AUTH_EMULATOR_HOST` is set, requests go to the emulator.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the HTTP client
    /// fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, AuthError> {
        let base = match &config.auth_emulator_host {
            Some(host) => format!("http://{host}/identitytoolkit.googleapis.com/v1/"),
            None => IDENTITY_TOOLKIT_URL.to_owned(),
        };
        let base_url = Url::parse(&base)
            .map_err(|e| AuthError::Unavailable(format!("invalid Identity Toolkit URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url, AuthError> {
        // `join` would read the `accounts:` prefix as a scheme
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AuthError::Unavailable("Identity Toolkit URL cannot be a base".to_owned()))?
            .pop_if_empty()
            .push(method);
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    /// POST a JSON body and decode the success response.
    ///
    /// Error responses are returned as the provider's error code (the part of
    /// the message before any ` : ` detail).
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Result<T, ProviderCode>, AuthError> {
        let response = self
            .client
            .post(self.endpoint(method)?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Ok(response.json().await?));
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(err) => Ok(Err(ProviderCode::parse(&err.error.message))),
            Err(_) => Err(AuthError::Unavailable(format!(
                "{method} returned {status}: {text}"
            ))),
        }
    }

    fn signed_in(response: TokenResponse, fallback_email: &Email) -> Result<SignedInUser, AuthError> {
        let id = UserId::parse(&response.local_id)
            .map_err(|e| AuthError::Provider(format!("invalid localId: {e}")))?;
        let email = response
            .email
            .as_deref()
            .and_then(|s| Email::parse(s).ok())
            .or_else(|| Some(fallback_email.clone()));

        Ok(SignedInUser {
            identity: UserIdentity {
                id,
                email,
                display_name: response.display_name.filter(|n| !n.is_empty()),
            },
            tokens: AuthTokens {
                id_token: SecretString::from(response.id_token),
                refresh_token: SecretString::from(response.refresh_token),
            },
        })
    }
}

/// Provider error code with optional human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProviderCode {
    code: String,
    detail: Option<String>,
}

impl ProviderCode {
    fn parse(message: &str) -> Self {
        match message.split_once(" : ") {
            Some((code, detail)) => Self {
                code: code.trim().to_owned(),
                detail: Some(detail.trim().to_owned()),
            },
            None => Self {
                code: message.trim().to_owned(),
                detail: None,
            },
        }
    }

    fn into_error(self) -> AuthError {
        match self.code.as_str() {
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                AuthError::InvalidCredentials
            }
            "EMAIL_EXISTS" => AuthError::UserAlreadyExists,
            "WEAK_PASSWORD" => AuthError::WeakPassword(
                self.detail
                    .unwrap_or_else(|| "password is too weak".to_owned()),
            ),
            "USER_DISABLED" => AuthError::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
            "INVALID_EMAIL" | "MISSING_EMAIL" => AuthError::InvalidEmail(EmailError::Malformed),
            "API_KEY_INVALID" | "CONFIGURATION_NOT_FOUND" | "OPERATION_NOT_ALLOWED" => {
                AuthError::Unavailable(self.code)
            }
            _ => AuthError::Provider(self.code),
        }
    }

    /// Codes that mean "this token does not identify anyone".
    fn is_invalid_token(&self) -> bool {
        matches!(
            self.code.as_str(),
            "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" | "USER_DISABLED"
        )
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseAuthClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignedInUser, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let response: TokenResponse = self
            .call("accounts:signInWithPassword", body)
            .await?
            .map_err(ProviderCode::into_error)?;

        Self::signed_in(response, email)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<SignedInUser, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let response: TokenResponse = self
            .call("accounts:signUp", body)
            .await?
            .map_err(ProviderCode::into_error)?;

        let mut user = Self::signed_in(response, email)?;

        if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
            let body = json!({
                "idToken": user.tokens.id_token.expose_secret(),
                "displayName": name,
                "returnSecureToken": false,
            });
            // The account exists at this point; a failed profile update only
            // loses the display name.
            match self.call::<serde_json::Value>("accounts:update", body).await {
                Ok(Ok(_)) => user.identity.display_name = Some(name.to_owned()),
                Ok(Err(code)) => {
                    tracing::warn!(code = %code.code, "Failed to set display name");
                }
                Err(e) => tracing::warn!(error = %e, "Failed to set display name"),
            }
        }

        Ok(user)
    }

    async fn sign_out(&self, _tokens: &AuthTokens) -> Result<(), AuthError> {
        Ok(())
    }

    #[instrument(skip_all)]
    async fn lookup(&self, id_token: &SecretString) -> Result<Option<UserIdentity>, AuthError> {
        let body = json!({ "idToken": id_token.expose_secret() });
        let response: LookupResponse = match self.call("accounts:lookup", body).await? {
            Ok(response) => response,
            Err(code) if code.is_invalid_token() => return Ok(None),
            Err(code) => return Err(code.into_error()),
        };

        let Some(user) = response.users.into_iter().next() else {
            return Ok(None);
        };
        if user.disabled {
            return Ok(None);
        }

        let id = UserId::parse(&user.local_id)
            .map_err(|e| AuthError::Provider(format!("invalid localId: {e}")))?;
        Ok(Some(UserIdentity {
            id,
            email: user.email.as_deref().and_then(|s| Email::parse(s).ok()),
            display_name: user.display_name.filter(|n| !n.is_empty()),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::FirestoreConfig;

    fn config(emulator: Option<&str>) -> FirebaseConfig {
        FirebaseConfig {
            api_key: SecretString::from("web-key"),
            auth_emulator_host: emulator.map(str::to_owned),
            firestore: FirestoreConfig {
                project_id: "demo-shop".to_owned(),
                access_token: None,
                emulator_host: None,
            },
        }
    }

    #[test]
    fn test_endpoint_production() {
        let client = FirebaseAuthClient::new(&config(None)).unwrap();
        let url = client.endpoint("accounts:signInWithPassword").unwrap();
        assert_eq!(
            url.as_str(),
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword?key=web-key"
        );
    }

    #[test]
    fn test_endpoint_emulator() {
        let client = FirebaseAuthClient::new(&config(Some("127.0.0.1:9099"))).unwrap();
        let url = client.endpoint("accounts:lookup").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9099/identitytoolkit.googleapis.com/v1/accounts:lookup?key=web-key"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_for_every_method() {
        let client = FirebaseAuthClient::new(&config(None)).unwrap();
        for method in ["accounts:signUp", "accounts:update", "accounts:lookup"] {
            let url = client.endpoint(method).unwrap();
            assert_eq!(url.scheme(), "https");
            assert_eq!(url.host_str(), Some("identitytoolkit.googleapis.com"));
            assert_eq!(url.path(), format!("/v1/{method}"));
            assert_eq!(url.query(), Some("key=web-key"));
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = FirebaseAuthClient::new(&config(None)).unwrap();
        assert!(!format!("{client:?}").contains("web-key"));
    }

    #[test]
    fn test_provider_code_parse() {
        let code = ProviderCode::parse("WEAK_PASSWORD : Password should be at least 6 characters");
        assert_eq!(code.code, "WEAK_PASSWORD");
        assert_eq!(
            code.detail.as_deref(),
            Some("Password should be at least 6 characters")
        );

        let code = ProviderCode::parse("EMAIL_EXISTS");
        assert_eq!(code.code, "EMAIL_EXISTS");
        assert!(code.detail.is_none());
    }

    #[test]
    fn test_provider_code_mapping() {
        assert!(matches!(
            ProviderCode::parse("INVALID_LOGIN_CREDENTIALS").into_error(),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            ProviderCode::parse("EMAIL_NOT_FOUND").into_error(),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            ProviderCode::parse("EMAIL_EXISTS").into_error(),
            AuthError::UserAlreadyExists
        ));
        assert!(matches!(
            ProviderCode::parse("WEAK_PASSWORD : too short").into_error(),
            AuthError::WeakPassword(detail) if detail == "too short"
        ));
        assert!(matches!(
            ProviderCode::parse("TOO_MANY_ATTEMPTS_TRY_LATER").into_error(),
            AuthError::TooManyAttempts
        ));
        assert!(matches!(
            ProviderCode::parse("SOMETHING_NEW").into_error(),
            AuthError::Provider(code) if code == "SOMETHING_NEW"
        ));
    }

    #[test]
    fn test_invalid_token_codes() {
        assert!(ProviderCode::parse("INVALID_ID_TOKEN").is_invalid_token());
        assert!(ProviderCode::parse("TOKEN_EXPIRED").is_invalid_token());
        assert!(!ProviderCode::parse("API_KEY_INVALID").is_invalid_token());
    }

    #[test]
    fn test_signed_in_falls_back_to_requested_email() {
        let requested = Email::parse("me@example.com").unwrap();
        let response = TokenResponse {
            local_id: "abc".to_owned(),
            email: None,
            display_name: Some(String::new()),
            id_token: "id".to_owned(),
            refresh_token: "refresh".to_owned(),
        };
        let user = FirebaseAuthClient::signed_in(response, &requested).unwrap();
        assert_eq!(user.identity.id.as_str(), "abc");
        assert_eq!(user.identity.email, Some(requested));
        assert!(user.identity.display_name.is_none());
    }
}
