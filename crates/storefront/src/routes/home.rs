//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::response::IntoResponse;
use tower_sessions::Session;
use tracing::instrument;

use crate::middleware::{OptionalAuth, take_flash};
use crate::models::UserIdentity;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub user: Option<UserIdentity>,
    pub flash: Option<&'static str>,
}

/// Display the home page.
///
/// Any queued flash message is shown once and then removed.
#[instrument(skip_all)]
pub async fn home(OptionalAuth(user): OptionalAuth, session: Session) -> impl IntoResponse {
    let flash = take_flash(&session).await.map(|flash| flash.text());
    HomeTemplate { user, flash }
}
