// =============================================================================
// filter.rs — THE VELVET ROPE
// =============================================================================
//
// Not every relay gets into the club. Before the roulette wheel spins, the
// catalog passes through a conjunction of predicates:
//
//   - active only        (the relay is actually up)
//   - owned only         (no rented boxes)
//   - location pattern   (anchored regex on the location key)
//   - provider pattern   (anchored regex on the provider name)
//   - allowed hostnames  (an explicit guest list)
//
// Every configured predicate must hold. Patterns are compiled when the
// criteria are built, so a broken regex is reported before a single relay is
// looked at and nothing is ever half-filtered.
//
// Anchored means the pattern has to match starting at position zero
// but does not have to eat the whole string. `^us` and `us`
// both match "us-west"; neither matches "eu-us".
//
// The output is a brand new catalog: surviving relays in their original order,
// plus exactly the locations they point at. No orphans, no dangling keys.
// =============================================================================

use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::models::{Catalog, LocationTable, Relay};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("{field} pattern {pattern:?} failed to compile: {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("relay {hostname:?} references location {location:?}, which is not in the location table")]
    MissingLocation { hostname: String, location: String },
}

/// A regex that only matches from the start of the haystack.
#[derive(Debug, Clone)]
pub struct AnchoredPattern {
    source: String,
    regex: Regex,
}

impl AnchoredPattern {
    /// Compile `pattern` for anchored matching. `field` only shows up in the
    /// error message.
    pub fn compile(field: &'static str, pattern: &str) -> Result<Self, FilterError> {
        let invalid = |source| FilterError::InvalidPattern {
            field,
            pattern: pattern.to_string(),
            source,
        };

        let regex = Regex::new(pattern).map_err(invalid)?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The leftmost match is reported first, so the pattern matches at
    /// position zero exactly when the first match starts there.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.find(haystack).is_some_and(|m| m.start() == 0)
    }

    /// The pattern as the user wrote it.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// The predicates to apply. All of them are optional; all present ones are
/// ANDed.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub active_only: bool,
    pub owned_only: bool,
    pub location_pattern: Option<AnchoredPattern>,
    pub provider_pattern: Option<AnchoredPattern>,
    pub allowed_hostnames: Option<HashSet<String>>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria that keep only the given hostnames and check nothing else.
    pub fn allow_only<I, S>(hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with_allowed_hostnames(hostnames)
    }

    pub fn with_active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    pub fn with_owned_only(mut self, owned_only: bool) -> Self {
        self.owned_only = owned_only;
        self
    }

    pub fn with_location_pattern(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.location_pattern = Some(AnchoredPattern::compile("location", pattern)?);
        Ok(self)
    }

    pub fn with_provider_pattern(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.provider_pattern = Some(AnchoredPattern::compile("provider", pattern)?);
        Ok(self)
    }

    pub fn with_allowed_hostnames<I, S>(mut self, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hostnames = Some(hostnames.into_iter().map(Into::into).collect());
        self
    }

    /// True when no predicate is configured at all.
    pub fn is_empty(&self) -> bool {
        !self.active_only
            && !self.owned_only
            && self.location_pattern.is_none()
            && self.provider_pattern.is_none()
            && self.allowed_hostnames.is_none()
    }

    /// Does this relay pass every configured predicate?
    pub fn matches(&self, relay: &Relay) -> bool {
        if let Some(allowed) = &self.allowed_hostnames {
            if !allowed.contains(&relay.hostname) {
                return false;
            }
        }
        if self.active_only && !relay.active {
            return false;
        }
        if self.owned_only && !relay.owned {
            return false;
        }
        if let Some(pattern) = &self.location_pattern {
            if !pattern.is_match(&relay.location) {
                return false;
            }
        }
        if let Some(pattern) = &self.provider_pattern {
            if !pattern.is_match(&relay.provider) {
                return false;
            }
        }
        true
    }
}

/// Filter `catalog` down to the relays matching `criteria`, bringing along
/// exactly the location entries they reference.
///
/// With no predicate configured the input is returned as an equal copy.
/// The input is never modified.
pub fn apply(catalog: &Catalog, criteria: &FilterCriteria) -> Result<Catalog, FilterError> {
    if criteria.is_empty() {
        debug!(relays = catalog.len(), "No filter criteria configured, catalog passes through");
        return Ok(catalog.clone());
    }

    let mut relays = Vec::new();
    let mut referenced = HashSet::new();

    for relay in catalog.relays().iter().filter(|r| criteria.matches(r)) {
        if !catalog.locations().contains_key(&relay.location) {
            return Err(FilterError::MissingLocation {
                hostname: relay.hostname.clone(),
                location: relay.location.clone(),
            });
        }
        referenced.insert(relay.location.as_str());
        relays.push(relay.clone());
    }

    // Walk the source table so the kept entries stay in its order.
    let locations: LocationTable = catalog
        .locations()
        .iter()
        .filter(|(key, _)| referenced.contains(key.as_str()))
        .map(|(key, location)| (key.clone(), location.clone()))
        .collect();

    debug!(
        input = catalog.len(),
        kept = relays.len(),
        locations = locations.len(),
        active_only = criteria.active_only,
        owned_only = criteria.owned_only,
        location_pattern = ?criteria.location_pattern.as_ref().map(AnchoredPattern::as_str),
        provider_pattern = ?criteria.provider_pattern.as_ref().map(AnchoredPattern::as_str),
        allow_list = ?criteria.allowed_hostnames.as_ref().map(HashSet::len),
        "Filter pass complete"
    );

    Ok(Catalog::from_parts(relays, locations))
}
