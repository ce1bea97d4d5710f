//! Build script for storefront crate.
//!
//! Bakes the admin allow-list into the binary. The list is read from the
//! `SHOPFRONT_ADMIN_EMAILS` environment variable at build time (comma
//! separated) and exported to the crate as `SHOPFRONT_ADMIN_DIRECTORY`, so
//! every deployment build carries a fixed, immutable directory.

use std::env;

/// Allow-list used when `SHOPFRONT_ADMIN_EMAILS` is not set.
const DEFAULT_ADMIN_EMAILS: &str = "kishore110804n@gmail.com";

fn main() {
    println!("cargo:rerun-if-env-changed=SHOPFRONT_ADMIN_EMAILS");

    let raw = env::var("SHOPFRONT_ADMIN_EMAILS")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN_EMAILS.to_owned());

    let emails: Vec<String> = raw
        .split(',')
        .map(|entry| entry.trim().to_owned())
        .filter(|entry| !entry.is_empty())
        .collect();

    // Fail the build instead of shipping a directory nobody can match
    for email in &emails {
        let valid = !email.chars().any(char::is_whitespace)
            && email.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            });
        assert!(valid, "invalid admin email in SHOPFRONT_ADMIN_EMAILS: {email:?}");
    }

    println!("cargo:rustc-env=SHOPFRONT_ADMIN_DIRECTORY={}", emails.join(","));
}
