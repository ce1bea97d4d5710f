//! Integration tests for Shopfront.
//!
//! Each test starts the full storefront router on an ephemeral port with
//! in-memory backends and drives it over HTTP with a cookie-aware client,
//! so sessions, redirects and the admin gate are exercised end to end.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! Admin emails for these tests come from the directory passed to
//! [`TestContext::with_directory`], not from the build-time list.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use reqwest::{Client, Response, redirect::Policy};
use tokio::task::JoinHandle;

use shopfront_core::{Email, Role, UserId};
use shopfront_storefront::config::{BackendConfig, StorefrontConfig};
use shopfront_storefront::db::ProfileRepository;
use shopfront_storefront::identity::MemoryIdentityProvider;
use shopfront_storefront::models::UserProfile;
use shopfront_storefront::routes;
use shopfront_storefront::services::AdminDirectory;
use shopfront_storefront::state::{AppState, Backends};
use shopfront_storefront::store::MemoryDocumentStore;

/// Email on the admin directory used by [`TestContext::new`].
pub const LISTED_ADMIN_EMAIL: &str = "owner@shop.test";

/// Password used for seeded accounts.
pub const PASSWORD: &str = "correct-horse";

/// A running storefront plus handles on its in-memory backends.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub identity: Arc<MemoryIdentityProvider>,
    pub store: Arc<MemoryDocumentStore>,
    pub profiles: ProfileRepository,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Start a storefront whose admin directory lists [`LISTED_ADMIN_EMAIL`].
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started.
    pub async fn new() -> Self {
        Self::with_directory(LISTED_ADMIN_EMAIL).await
    }

    /// Start a storefront with the given comma-separated admin directory.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started.
    #[allow(clippy::expect_used)]
    pub async fn with_directory(directory: &str) -> Self {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let store = Arc::new(MemoryDocumentStore::new());
        let backends = Backends {
            identity: identity.clone(),
            documents: store.clone(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("Listener has no address");
        let base_url = format!("http://{addr}");

        let config = StorefrontConfig {
            host: addr.ip(),
            port: addr.port(),
            base_url: base_url.clone(),
            backend: BackendConfig::Memory,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };
        let state = AppState::new(config, backends, AdminDirectory::from_list(directory));
        let profiles = state.profiles().clone();
        let app = routes::app(state);

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            identity,
            store,
            profiles,
            server,
        }
    }

    /// Absolute URL for a path on the test server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A second client with its own cookie jar (another browser).
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn new_client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Create an account and its profile document directly in the backends.
    ///
    /// # Panics
    ///
    /// Panics if the email is invalid or the writes fail.
    #[allow(clippy::expect_used)]
    pub async fn seed_user(&self, email: &str, role: Option<Role>) -> UserId {
        let email = Email::parse(email).expect("Invalid seed email");
        let identity = self
            .identity
            .with_user(&email, PASSWORD, None)
            .await
            .expect("Failed to seed account");

        let mut profile = UserProfile::new(email, None, Utc::now());
        profile.role = role;
        self.profiles
            .create(&identity.id, &profile)
            .await
            .expect("Failed to seed profile");

        identity.id
    }

    /// Create an account with no profile document.
    ///
    /// # Panics
    ///
    /// Panics if the email is invalid.
    #[allow(clippy::expect_used)]
    pub async fn seed_account_only(&self, email: &str) -> UserId {
        let email = Email::parse(email).expect("Invalid seed email");
        self.identity
            .with_user(&email, PASSWORD, None)
            .await
            .expect("Failed to seed account")
            .id
    }

    /// Sign in through the login form with the default client.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn login(&self, email: &str) -> Response {
        self.login_with(&self.client, email, PASSWORD).await
    }

    /// Sign in through the login form with any client.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn login_with(&self, client: &Client, email: &str, password: &str) -> Response {
        client
            .post(self.url("/auth/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET a path with the default client.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// POST a form with the default client.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// The `Location` header of a redirect response.
#[must_use]
pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
