//! Recipient routing for waypost
//!
//! A [`RoutingTable`] maps *selectors* to target addresses. Three selector
//! forms exist, consulted in this order:
//!
//! 1. the full recipient address (`user@example.com`)
//! 2. a domain catch-all (`@example.com`)
//! 3. the global default (`@default`)
//!
//! [`resolve`] walks the tiers and returns the first hit, if any.
//!
//! ```
//! use waypost_routing::{RoutingTable, Selector, resolve};
//!
//! let table: RoutingTable = [
//!     ("user1@yourdomain.com", "user1@personal.com"),
//!     ("@yourdomain.com", "catchall@personal.com"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let route = resolve("support@yourdomain.com", &table).unwrap();
//! assert_eq!(route.target, "catchall@personal.com");
//! assert_eq!(route.selector, Selector::Domain("yourdomain.com"));
//! ```

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Selector naming the global fallback target.
pub const DEFAULT_SELECTOR: &str = "@default";

/// Selector to target address mapping.
///
/// Deserializes from a flat string map, e.g. in RON:
///
/// ```ron
/// {
///     "user1@yourdomain.com": "user1@personal.com",
///     "@yourdomain.com": "catchall@personal.com",
///     "@default": "fallback@personal.com",
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    rules: AHashMap<String, String>,
}

impl RoutingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the target for a selector
    pub fn insert(&mut self, selector: impl Into<String>, target: impl Into<String>) {
        self.rules.insert(selector.into(), target.into());
    }

    #[must_use]
    pub fn get(&self, selector: &str) -> Option<&str> {
        self.rules.get(selector).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether a global default is configured
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.rules.contains_key(DEFAULT_SELECTOR)
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for RoutingTable {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        Self {
            rules: iter
                .into_iter()
                .map(|(selector, target)| (selector.into(), target.into()))
                .collect(),
        }
    }
}

/// Which tier of the table produced a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    /// The recipient address itself
    Exact,
    /// `@domain`, carrying the domain that matched
    Domain(&'a str),
    /// `@default`
    Default,
}

impl fmt::Display for Selector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Domain(domain) => write!(f, "@{domain}"),
            Self::Default => f.write_str(DEFAULT_SELECTOR),
        }
    }
}

/// A resolved target and the selector tier that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route<'a> {
    pub target: &'a str,
    pub selector: Selector<'a>,
}

/// The domain part of `recipient`: the segment after the first `@`, up to any
/// further `@`. Empty segments count as no domain.
fn domain_of(recipient: &str) -> Option<&str> {
    recipient.split('@').nth(1).filter(|domain| !domain.is_empty())
}

/// Find the single target for `recipient`.
///
/// Exact address first, then the recipient's domain catch-all, then the
/// global default. Returns `None` only when all three miss. A recipient
/// without an `@` skips the catch-all tier.
#[must_use]
pub fn resolve<'a>(recipient: &'a str, table: &'a RoutingTable) -> Option<Route<'a>> {
    if let Some(target) = table.get(recipient) {
        return Some(Route {
            target,
            selector: Selector::Exact,
        });
    }

    if let Some(domain) = domain_of(recipient)
        && let Some(target) = table.get(&format!("@{domain}"))
    {
        return Some(Route {
            target,
            selector: Selector::Domain(domain),
        });
    }

    table.get(DEFAULT_SELECTOR).map(|target| Route {
        target,
        selector: Selector::Default,
    })
}
