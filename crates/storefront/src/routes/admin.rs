//! Admin area route handlers.
//!
//! `/admin` is the gate: it restores the session, waits for it to settle,
//! verifies admin status, and redirects exactly once. The dashboard and the
//! grant action check admin status again on every request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use shopfront_core::UserId;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{
    RequireAdmin, RequireAuth, drop_stale_tokens, set_flash, stored_auth_tokens,
};
use crate::models::{UserIdentity, UserProfile};
use crate::services::gate::ADMIN_DASHBOARD_PATH;
use crate::services::{AdminGate, GrantError};
use crate::state::AppState;

/// Path of the gated admin entry point.
pub const ADMIN_PATH: &str = "/admin";

/// Grant form data.
#[derive(Debug, Deserialize)]
pub struct GrantForm {
    pub user_id: String,
}

/// Query parameters for the dashboard.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub granted: Option<String>,
    pub error: Option<String>,
}

/// Admin dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub user: UserIdentity,
    pub profile: Option<UserProfile>,
    pub directory_size: usize,
    pub granted: Option<String>,
    pub error: Option<&'static str>,
}

fn grant_error_text(code: &str) -> &'static str {
    match code {
        "invalid_user" => "That is not a valid user ID.",
        "not_found" => "No profile exists for that user.",
        _ => "The grant could not be completed.",
    }
}

/// Admin gate.
///
/// Runs the gate against this request's session: anonymous visitors go to
/// sign-in (returning here), admins go to the dashboard, everyone else goes
/// home with a message.
#[instrument(skip_all)]
pub async fn gate(State(state): State<AppState>, session: Session) -> Response {
    let tokens = stored_auth_tokens(&session).await;
    let provider = state.session_provider();
    let mut gate = AdminGate::new(state.resolver().clone(), ADMIN_PATH);

    let (navigation, ()) = tokio::join!(
        gate.run(provider.subscribe()),
        provider.restore(tokens.as_ref())
    );

    let identity = provider.settled().await.identity;
    drop_stale_tokens(&session, tokens.as_ref(), identity.as_ref()).await;

    if let Some(flash) = navigation.flash() {
        if let Err(e) = set_flash(&session, flash).await {
            tracing::warn!(error = %e, "Failed to set gate flash");
        }
    }

    tracing::debug!(location = %navigation.location(), "Admin gate resolved");
    Redirect::to(&navigation.location()).into_response()
}

/// Admin dashboard.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn dashboard(
    RequireAdmin(user): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse> {
    let profile = state.profiles().get(&user.id).await?;

    Ok(DashboardTemplate {
        user,
        profile,
        directory_size: state.resolver().directory().len(),
        granted: query.granted,
        error: query.error.as_deref().map(grant_error_text),
    })
}

/// Grant admin privileges to another user.
///
/// The caller's own admin status is verified before anything is written.
#[instrument(skip_all, fields(caller = %caller.id))]
pub async fn grant(
    RequireAuth(caller): RequireAuth,
    State(state): State<AppState>,
    Form(form): Form<GrantForm>,
) -> Result<Response> {
    let Ok(target) = UserId::parse(form.user_id.trim()) else {
        return Ok(dashboard_redirect("error=invalid_user"));
    };

    match state
        .resolver()
        .grant_admin_privileges(&caller.id, &target)
        .await
    {
        Ok(()) => {
            add_breadcrumb("admin", "Admin privileges granted", &[("target", target.as_str())]);
            Ok(dashboard_redirect(&format!(
                "granted={}",
                urlencoding::encode(target.as_str())
            )))
        }
        Err(GrantError::TargetNotFound(_)) => Ok(dashboard_redirect("error=not_found")),
        Err(e) => Err(AppError::Grant(e)),
    }
}

fn dashboard_redirect(query: &str) -> Response {
    Redirect::to(&format!("{ADMIN_DASHBOARD_PATH}?{query}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_error_text() {
        assert_eq!(grant_error_text("not_found"), "No profile exists for that user.");
        assert_eq!(
            grant_error_text("anything"),
            "The grant could not be completed."
        );
    }

    #[test]
    fn test_dashboard_redirect() {
        let response = dashboard_redirect("granted=u1");
        assert_eq!(
            response.headers().get("location").and_then(|v| v.to_str().ok()),
            Some("/admin/dashboard?granted=u1")
        );
    }
}
