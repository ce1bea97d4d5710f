//! Admin gate.
//!
//! Route guard for the admin area. Waits for the session to settle, asks the
//! [`AuthorizationResolver`] about the signed-in user, and produces exactly
//! one [`Navigation`]:
//!
//! ```text
//! Pending --(loading)--> Pending
//! Pending --(signed out)--> Resolved(SignIn)
//! Pending --(signed in)--> Verifying --(admin)--> Resolved(AdminDashboard)
//!                                    --(not admin)--> Resolved(Home + insufficient privileges)
//!                                    --(error)--> Resolved(Home + verification failed)
//! ```
//!
//! Once resolved, later session changes are ignored.

use tokio::sync::watch;

use crate::models::FlashMessage;
use crate::services::authorization::AuthorizationResolver;
use crate::services::session::SessionSnapshot;

/// Sign-in page path.
pub const SIGN_IN_PATH: &str = "/auth/login";
/// Admin dashboard path.
pub const ADMIN_DASHBOARD_PATH: &str = "/admin/dashboard";
/// Home page path.
pub const HOME_PATH: &str = "/";

/// Where the gate sends the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Sign in, then come back to `return_to`.
    SignIn { return_to: String },
    /// The admin dashboard.
    AdminDashboard,
    /// The home page, optionally showing a one-shot message.
    Home { flash: Option<FlashMessage> },
}

impl Navigation {
    /// Location to redirect to.
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            Self::SignIn { return_to } => {
                format!("{SIGN_IN_PATH}?redirect={}", urlencoding::encode(return_to))
            }
            Self::AdminDashboard => ADMIN_DASHBOARD_PATH.to_owned(),
            Self::Home { .. } => HOME_PATH.to_owned(),
        }
    }

    /// Message to show after redirecting, if any.
    #[must_use]
    pub const fn flash(&self) -> Option<FlashMessage> {
        match self {
            Self::Home { flash } => *flash,
            Self::SignIn { .. } | Self::AdminDashboard => None,
        }
    }
}

/// Gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for the session to settle.
    Pending,
    /// Admin status is being resolved.
    Verifying,
    /// A navigation has been produced; terminal.
    Resolved(Navigation),
}

/// Route guard for admin pages.
pub struct AdminGate {
    resolver: AuthorizationResolver,
    return_path: String,
    state: GateState,
}

impl AdminGate {
    /// Create a gate for a request to `return_path`.
    #[must_use]
    pub fn new(resolver: AuthorizationResolver, return_path: impl Into<String>) -> Self {
        Self {
            resolver,
            return_path: return_path.into(),
            state: GateState::Pending,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &GateState {
        &self.state
    }

    /// Feed one session state into the gate.
    ///
    /// Returns the navigation the first time the gate resolves and `None`
    /// otherwise (still loading, or already resolved).
    pub async fn observe(&mut self, snapshot: &SessionSnapshot) -> Option<Navigation> {
        if !matches!(self.state, GateState::Pending) || snapshot.loading {
            return None;
        }

        let navigation = match &snapshot.identity {
            None => Navigation::SignIn {
                return_to: self.return_path.clone(),
            },
            Some(identity) => {
                self.state = GateState::Verifying;
                match self.resolver.verify(Some(&identity.id)).await {
                    Ok(true) => Navigation::AdminDashboard,
                    Ok(false) => {
                        tracing::info!(user_id = %identity.id, "Admin area denied");
                        Navigation::Home {
                            flash: Some(FlashMessage::InsufficientPrivileges),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(user_id = %identity.id, error = %e, "Admin verification failed");
                        Navigation::Home {
                            flash: Some(FlashMessage::VerificationFailed),
                        }
                    }
                }
            }
        };

        self.state = GateState::Resolved(navigation.clone());
        Some(navigation)
    }

    /// Drive the gate from a session channel until it resolves.
    ///
    /// If the channel closes before the session settles, the user is sent
    /// to sign in.
    pub async fn run(&mut self, mut session: watch::Receiver<SessionSnapshot>) -> Navigation {
        loop {
            if let GateState::Resolved(navigation) = &self.state {
                return navigation.clone();
            }

            let snapshot = session.borrow_and_update().clone();
            if let Some(navigation) = self.observe(&snapshot).await {
                return navigation;
            }

            if session.changed().await.is_err() {
                let navigation = Navigation::SignIn {
                    return_to: self.return_path.clone(),
                };
                self.state = GateState::Resolved(navigation.clone());
                return navigation;
            }
        }
    }
}

/// Validate a user-supplied return path.
///
/// Only same-site absolute paths are accepted; anything that a browser could
/// treat as another origin (`//host`, `/\host`, `https://...`) is rejected.
#[must_use]
pub fn sanitize_return_path(path: &str) -> Option<&str> {
    let path = path.trim();
    let valid = path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control);
    valid.then_some(path)
}
