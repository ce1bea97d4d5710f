//! Shopfront Core - Shared types library.
//!
//! This crate provides common types used across all Shopfront components:
//! - `storefront` - Public-facing site, session handling and admin gating
//! - `cli` - Command-line tools for trusted admin management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no remote clients, no HTTP.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for user IDs, emails, and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
