//! Domain models for storefront.
//!
//! - [`user`] - Identities from the identity provider and profile documents
//! - [`session`] - Values kept in the cookie session between requests

pub mod session;
pub mod user;

pub use session::{FlashMessage, StoredTokens, keys as session_keys};
pub use user::{UserIdentity, UserProfile};
