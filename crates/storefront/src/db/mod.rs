//! Repositories over the document store.
//!
//! # Collections
//!
//! - `users` - one profile document per identity, keyed by the provider's
//!   user id (see [`ProfileRepository`])
//!
//! The identity provider is the source of truth for credentials. Profiles
//! only carry the display data copied at sign-up and the `role` field.

mod profiles;

pub use profiles::{ProfileRepository, USERS_COLLECTION};
