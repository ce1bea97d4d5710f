//! Authentication extractors and session helpers.
//!
//! The cookie session only stores the identity provider's tokens. Every
//! extractor builds a [`SessionProvider`](crate::services::SessionProvider)
//! for the request, restores it from those tokens, and reads the settled
//! identity.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::identity::AuthTokens;
use crate::models::{FlashMessage, StoredTokens, UserIdentity, session_keys};
use crate::services::Navigation;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, redirects to the sign-in page with the requested
/// path as the return destination.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.greeting_name())
/// }
/// ```
pub struct RequireAuth(pub UserIdentity);

/// Extractor that requires a signed-in administrator.
///
/// Admin status is resolved on every request, so promotions and the admin
/// directory take effect without signing in again.
pub struct RequireAdmin(pub UserIdentity);

/// Extractor that optionally gets the signed-in user.
pub struct OptionalAuth(pub Option<UserIdentity>);

/// Error returned when authentication or admin status is required.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to the sign-in page, returning to the given path afterwards.
    RedirectToLogin(String),
    /// No session layer on this route.
    Unauthorized,
    /// Signed in, but not an administrator.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(return_to) => {
                Redirect::to(&Navigation::SignIn { return_to }.location()).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admin privileges required").into_response(),
        }
    }
}

/// Resolve the signed-in user for this request.
async fn current_identity(session: &Session, state: &AppState) -> Option<UserIdentity> {
    let tokens = stored_auth_tokens(session).await;

    let provider = state.session_provider();
    provider.restore(tokens.as_ref()).await;
    let identity = provider.settled().await.identity;

    drop_stale_tokens(session, tokens.as_ref(), identity.as_ref()).await;
    identity
}

fn session_from(parts: &Parts) -> Result<Session, AuthRejection> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or(AuthRejection::Unauthorized)
}

fn requested_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string)
}

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        let state = AppState::from_ref(state);

        current_identity(&session, &state)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection::RedirectToLogin(requested_path(parts)))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(identity) = RequireAuth::from_request_parts(parts, state).await?;
        let state = AppState::from_ref(state);

        if state.resolver().is_admin(Some(&identity.id)).await {
            Ok(Self(identity))
        } else {
            tracing::info!(user_id = %identity.id, path = %parts.uri.path(), "Admin route denied");
            Err(AuthRejection::Forbidden)
        }
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<Session>() {
            Some(session) => current_identity(session, &AppState::from_ref(state)).await,
            None => None,
        };
        Ok(Self(identity))
    }
}

// =============================================================================
// Session helpers
// =============================================================================

/// Read the identity provider tokens stored for this session.
pub async fn stored_auth_tokens(session: &Session) -> Option<AuthTokens> {
    match session.get::<StoredTokens>(session_keys::AUTH_TOKENS).await {
        Ok(tokens) => tokens.map(AuthTokens::from),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable auth tokens in session");
            None
        }
    }
}

/// Store the identity provider tokens after sign-in.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_auth_tokens(
    session: &Session,
    tokens: &AuthTokens,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::AUTH_TOKENS, StoredTokens::from(tokens))
        .await
}

/// Remove the identity provider tokens (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_auth_tokens(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<StoredTokens>(session_keys::AUTH_TOKENS)
        .await?;
    Ok(())
}

/// Drop stored tokens that did not restore to a signed-in user.
pub async fn drop_stale_tokens(
    session: &Session,
    stored: Option<&AuthTokens>,
    identity: Option<&UserIdentity>,
) {
    if stored.is_some() && identity.is_none() {
        if let Err(e) = clear_auth_tokens(session).await {
            tracing::warn!(error = %e, "Failed to clear stale auth tokens");
        }
    }
}

/// Queue a message for the next page render.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_flash(
    session: &Session,
    flash: FlashMessage,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::FLASH, flash).await
}

/// Take the queued message, if any. It is removed from the session.
pub async fn take_flash(session: &Session) -> Option<FlashMessage> {
    session
        .remove::<FlashMessage>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}
