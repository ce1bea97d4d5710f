//! Authentication route handlers.
//!
//! Handles login, registration, and logout against the identity provider.
//! Failures redirect back to the form with a short error code in the query
//! string; the page maps the code to a message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::Email;

use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::identity::AuthTokens;
use crate::middleware::{clear_auth_tokens, set_auth_tokens, set_flash, stored_auth_tokens};
use crate::models::FlashMessage;
use crate::services::gate::{HOME_PATH, SIGN_IN_PATH, sanitize_return_path};
use crate::state::AppState;

const REGISTER_PATH: &str = "/auth/register";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Where to go after signing in.
    pub redirect: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub display_name: Option<String>,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for the auth pages.
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub error: Option<String>,
    pub redirect: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<&'static str>,
    pub redirect: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<&'static str>,
}

/// Message shown for an error code from the query string.
fn error_text(code: &str) -> &'static str {
    match code {
        "invalid_email" => "Please enter a valid email address.",
        "invalid_credentials" => "Invalid email or password.",
        "email_taken" => "An account with this email already exists.",
        "weak_password" => "Password should be at least 6 characters.",
        "password_mismatch" => "Passwords do not match.",
        "disabled" => "This account has been disabled.",
        "rate_limited" => "Too many attempts. Please try again later.",
        "profile" => "Your account was created but your profile could not be saved. Please contact support.",
        "session" => "Could not start your session. Please try again.",
        "unavailable" => "The sign-in service is unavailable. Please try again later.",
        _ => "Something went wrong. Please try again.",
    }
}

fn login_error(code: &str, redirect: Option<&str>) -> Response {
    let mut location = format!("{SIGN_IN_PATH}?error={code}");
    if let Some(redirect) = redirect {
        location.push_str("&redirect=");
        location.push_str(&urlencoding::encode(redirect));
    }
    Redirect::to(&location).into_response()
}

fn register_error(code: &str) -> Response {
    Redirect::to(&format!("{REGISTER_PATH}?error={code}")).into_response()
}

/// Start an authenticated session with fresh tokens.
async fn start_session(
    session: &Session,
    tokens: &AuthTokens,
) -> Result<(), tower_sessions::session::Error> {
    // New session id on privilege change
    session.cycle_id().await?;
    set_auth_tokens(session, tokens).await
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(Query(query): Query<AuthQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: query.error.as_deref().map(error_text),
        redirect: query
            .redirect
            .as_deref()
            .and_then(sanitize_return_path)
            .map(str::to_owned),
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let redirect = form.redirect.as_deref().and_then(sanitize_return_path);

    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(_) => return login_error("invalid_email", redirect),
    };

    let password = SecretString::from(form.password);
    let provider = state.session_provider();
    let tokens = match provider.sign_in(&email, &password).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            return login_error(e.code(), redirect);
        }
    };

    if let Err(e) = start_session(&session, &tokens).await {
        tracing::error!(error = %e, "Failed to set session");
        return login_error("session", redirect);
    }

    if let Some(identity) = provider.settled().await.identity {
        set_sentry_user(&identity.id);
    }
    add_breadcrumb("auth", "User logged in", &[]);

    Redirect::to(redirect.unwrap_or(HOME_PATH)).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(Query(query): Query<AuthQuery>) -> impl IntoResponse {
    RegisterTemplate {
        error: query.error.as_deref().map(error_text),
    }
}

/// Handle registration form submission.
///
/// Creates the identity and its profile document, then signs the user in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    if form.password != form.password_confirm {
        return register_error("password_mismatch");
    }

    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(_) => return register_error("invalid_email"),
    };

    let display_name = form
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let password = SecretString::from(form.password);
    let provider = state.session_provider();
    let tokens = match provider.sign_up(&email, &password, display_name).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            return register_error(e.code());
        }
    };

    if let Err(e) = start_session(&session, &tokens).await {
        tracing::error!(error = %e, "Failed to set session after registration");
        return login_error("session", None);
    }

    if let Some(identity) = provider.settled().await.identity {
        set_sentry_user(&identity.id);
    }
    add_breadcrumb("auth", "User registered", &[]);

    Redirect::to(HOME_PATH).into_response()
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// The local session is always cleared, even if the provider call fails.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    let tokens = stored_auth_tokens(&session).await;

    if let Err(e) = state.session_provider().log_out(tokens.as_ref()).await {
        tracing::warn!(error = %e, "Provider sign-out failed");
    }

    if let Err(e) = clear_auth_tokens(&session).await {
        tracing::error!(error = %e, "Failed to clear session tokens");
    }
    if let Err(e) = session.cycle_id().await {
        tracing::warn!(error = %e, "Failed to cycle session id");
    }
    if let Err(e) = set_flash(&session, FlashMessage::SignedOut).await {
        tracing::warn!(error = %e, "Failed to set sign-out flash");
    }

    clear_sentry_user();
    Redirect::to(HOME_PATH).into_response()
}
