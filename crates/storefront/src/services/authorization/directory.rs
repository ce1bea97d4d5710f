//! Admin directory: the fixed allow-list of administrator emails.

use std::collections::HashSet;

use shopfront_core::Email;

/// Comma-separated allow-list baked in by the build script.
const BUILD_DIRECTORY: &str = env!("SHOPFRONT_ADMIN_DIRECTORY");

/// Immutable set of administrator email addresses.
///
/// Membership is exact: an email matches only when it is stored with the same
/// spelling and casing as the directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminDirectory {
    emails: HashSet<String>,
}

impl AdminDirectory {
    /// Build a directory from email strings. Blank entries are ignored.
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_owned())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Build a directory from a comma-separated list.
    #[must_use]
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// The directory fixed for this build (`SHOPFRONT_ADMIN_EMAILS` at compile
    /// time).
    #[must_use]
    pub fn from_build() -> Self {
        Self::from_list(BUILD_DIRECTORY)
    }

    /// Whether the email belongs to an administrator.
    #[must_use]
    pub fn contains(&self, email: &Email) -> bool {
        self.emails.contains(email.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Whether the directory has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[test]
    fn test_membership_is_exact() {
        let directory = AdminDirectory::from_list("owner@shop.com");
        assert!(directory.contains(&email("owner@shop.com")));
        assert!(!directory.contains(&email("OWNER@shop.com")));
        assert!(!directory.contains(&email("owner@Shop.com")));
        assert!(!directory.contains(&email("someone@shop.com")));
    }

    #[test]
    fn test_from_list_skips_blank_entries() {
        let directory = AdminDirectory::from_list(" a@x.com , ,b@x.com,");
        assert_eq!(directory.len(), 2);
        assert!(directory.contains(&email("b@x.com")));
        assert!(AdminDirectory::from_list("").is_empty());
    }

    #[test]
    fn test_build_directory_is_not_empty() {
        assert!(!AdminDirectory::from_build().is_empty());
    }

    #[test]
    fn test_build_directory_entries_are_valid_emails() {
        for entry in BUILD_DIRECTORY.split(',') {
            assert!(Email::parse(entry).is_ok(), "unmatchable entry {entry:?}");
        }
    }
}
