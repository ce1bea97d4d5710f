//! CLI subcommand implementations.

pub mod admin;
