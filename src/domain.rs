//! Page domain derivation.
//!
//! A [`Domain`] is the hostname a page agent answers for and the unit of
//! exception matching. It is derived once per page load from the document
//! location, or per action from the active tab's URL, and never persisted.

#[cfg(test)]
#[path = "domain_test.rs"]
mod domain_test;

use std::fmt;

use url::Url;

/// Hostname of a page, as extracted from an `http`/`https` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    /// Wrap an already-known hostname.
    ///
    /// Hosts that read the hostname directly (a document location, a
    /// simulation config) construct through here; URL text goes through
    /// [`Domain::from_page_url`].
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self(hostname.into())
    }

    /// Extract the domain from a page URL.
    ///
    /// Returns `None` for anything that cannot host a page agent: internal
    /// browser pages, non-`http(s)` schemes, or text that does not parse as
    /// a URL.
    #[must_use]
    pub fn from_page_url(raw: &str) -> Option<Self> {
        let Ok(url) = Url::parse(raw) else {
            return None;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;
        Some(Self(host.to_string()))
    }

    /// The hostname as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
