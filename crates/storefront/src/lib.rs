//! Shopfront Storefront library.
//!
//! Session handling, admin authorization and the admin gate, exposed as a
//! library so the binary, the CLI and the integration tests share one
//! implementation.
//!
//! # Modules
//!
//! - [`identity`] - Remote identity provider (Firebase Auth REST, in-memory)
//! - [`store`] - Remote document store (Firestore REST, in-memory)
//! - [`db`] - Profile documents on top of the store
//! - [`services`] - Session provider, authorization resolver, admin gate
//! - [`routes`] / [`middleware`] - The HTTP surface

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
