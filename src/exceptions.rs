//! Excepted domains: pages that stay light even while dark mode is on.
//!
//! Stored under the `exceptions` key as a plain JSON array of hostnames.
//! Membership is exact string equality; hostnames arrive already lowercased
//! from URL parsing. Insertion order is kept for display only.

#[cfg(test)]
#[path = "exceptions_test.rs"]
mod exceptions_test;

use serde::{Deserialize, Serialize};

/// A duplicate-free list of excepted domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionSet {
    domains: Vec<String>,
}

impl ExceptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `domain` is excepted.
    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d == domain)
    }

    /// Add `domain` unless already present. Returns `true` if it was added.
    pub fn insert(&mut self, domain: &str) -> bool {
        if self.contains(domain) {
            return false;
        }
        self.domains.push(domain.to_string());
        true
    }

    /// Remove every occurrence of `domain`. Returns `true` if any was removed.
    ///
    /// Stored arrays normally hold no duplicates, but arrays written by other
    /// tools may; removal clears them all.
    pub fn remove(&mut self, domain: &str) -> bool {
        let before = self.domains.len();
        self.domains.retain(|d| d != domain);
        self.domains.len() != before
    }

    /// Iterate domains in insertion order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    /// Number of excepted domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Returns `true` if no domain is excepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExceptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for domain in iter {
            set.insert(&domain.into());
        }
        set
    }
}
