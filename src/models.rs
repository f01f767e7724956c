// =============================================================================
// models.rs — THE RELAY LEDGER
// =============================================================================
//
// The value types everything else in the engine passes around: one `Relay`
// per WireGuard endpoint, a `LocationTable` of the places those relays live,
// and the `Catalog` that pairs the two.
//
// The relay catalog carries far more than we care about (public keys,
// IPv6 addresses, port ranges, DAITA flags...). We name the six fields the
// engine actually reasons about and keep the whole JSON object next to them,
// key order and all, so a filtered catalog still looks like a catalog.
//
// Catalogs are read-only once built. Filtering produces a brand new one.
// =============================================================================

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// One WireGuard endpoint from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Relay {
    /// Unique across the catalog. This is what we print.
    pub hostname: String,

    /// Key into the catalog's location table, e.g. `"se-sto"`.
    pub location: String,

    /// Inactive relays are in the catalog but not accepting connections.
    pub active: bool,

    /// Owned outright by the operator rather than rented from a provider.
    pub owned: bool,

    /// Hosting provider name, e.g. `"31173"` or `"DataPacket"`.
    pub provider: String,

    /// Selection bias. Kept as the JSON number it arrived as so that a `100`
    /// goes back out as `100` and not `100.0`. Whether it is a usable weight
    /// is the sampler's call, not ours.
    pub weight: Number,

    /// The relay's JSON object as it was read, named fields included. On the
    /// way out the named fields are written back over their own keys, so the
    /// key order stays the source's.
    pub fields: Map<String, Value>,
}

/// The named part of a relay object.
#[derive(Deserialize)]
struct RelayFields {
    hostname: String,
    location: String,
    active: bool,
    owned: bool,
    provider: String,
    weight: Number,
}

impl TryFrom<Map<String, Value>> for Relay {
    type Error = serde_json::Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let named: RelayFields = serde_json::from_value(Value::Object(fields.clone()))?;
        Ok(Relay {
            hostname: named.hostname,
            location: named.location,
            active: named.active,
            owned: named.owned,
            provider: named.provider,
            weight: named.weight,
            fields,
        })
    }
}

impl From<Relay> for Map<String, Value> {
    fn from(relay: Relay) -> Self {
        let mut fields = relay.fields;
        // Existing keys keep their slot; only missing ones are appended.
        fields.insert("hostname".to_string(), Value::String(relay.hostname));
        fields.insert("location".to_string(), Value::String(relay.location));
        fields.insert("active".to_string(), Value::Bool(relay.active));
        fields.insert("owned".to_string(), Value::Bool(relay.owned));
        fields.insert("provider".to_string(), Value::String(relay.provider));
        fields.insert("weight".to_string(), Value::Number(relay.weight));
        fields
    }
}

impl Relay {
    /// The weight as a float for the sampler. Without serde_json's
    /// `arbitrary_precision` feature every `Number` has an `f64` view; NaN is
    /// the fallback that the sampler will reject as non-integer.
    pub fn weight_value(&self) -> f64 {
        self.weight.as_f64().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, provider {}, weight {}{}{})",
            self.hostname,
            self.location,
            self.provider,
            self.weight,
            if self.active { "" } else { ", inactive" },
            if self.owned { ", owned" } else { "" },
        )
    }
}

/// Location metadata (city, country, coordinates...). The engine never looks
/// inside; it only decides which entries travel with the surviving relays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(pub Map<String, Value>);

/// Location key -> metadata, in the order the source listed them.
pub type LocationTable = IndexMap<String, Location>;

/// Consistency faults in a set of relays and locations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("hostname {hostname:?} appears more than once in the catalog")]
    DuplicateHostname { hostname: String },

    #[error("relay {hostname:?} references location {location:?}, which is not in the location table")]
    UnknownLocation { hostname: String, location: String },
}

/// Relays plus the locations they point at.
///
/// Every relay's location key is guaranteed to be in `locations` and every
/// hostname is unique. The table may hold entries no relay references when
/// it comes straight from the source; filtered catalogs never do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    relays: Vec<Relay>,
    locations: LocationTable,
}

impl Catalog {
    /// Validate and assemble a catalog.
    pub fn new(relays: Vec<Relay>, locations: LocationTable) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(relays.len());
        for relay in &relays {
            if !seen.insert(relay.hostname.as_str()) {
                return Err(CatalogError::DuplicateHostname {
                    hostname: relay.hostname.clone(),
                });
            }
            if !locations.contains_key(&relay.location) {
                return Err(CatalogError::UnknownLocation {
                    hostname: relay.hostname.clone(),
                    location: relay.location.clone(),
                });
            }
        }

        Ok(Self { relays, locations })
    }

    /// Assemble a catalog from parts the caller has already made consistent.
    /// Only the filter engine builds catalogs this way.
    pub(crate) fn from_parts(relays: Vec<Relay>, locations: LocationTable) -> Self {
        Self { relays, locations }
    }

    pub fn relays(&self) -> &[Relay] {
        &self.relays
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Look a relay up by hostname.
    pub fn relay(&self, hostname: &str) -> Option<&Relay> {
        self.relays.iter().find(|r| r.hostname == hostname)
    }
}

/// Small builders for tests across the crate.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::json;

    pub fn relay(hostname: &str, location: &str, active: bool, owned: bool, weight: i64) -> Relay {
        relay_with_provider(hostname, location, "31173", active, owned, weight)
    }

    pub fn relay_with_provider(
        hostname: &str,
        location: &str,
        provider: &str,
        active: bool,
        owned: bool,
        weight: i64,
    ) -> Relay {
        let object = json!({
            "hostname": hostname,
            "location": location,
            "active": active,
            "owned": owned,
            "provider": provider,
            "ipv4_addr_in": "10.0.0.1",
            "weight": weight,
        });
        serde_json::from_value(object).expect("test relay must deserialize")
    }

    pub fn location(city: &str) -> Location {
        let mut fields = Map::new();
        fields.insert("city".to_string(), json!(city));
        Location(fields)
    }

    pub fn catalog(relays: Vec<Relay>, location_keys: &[&str]) -> Catalog {
        let locations = location_keys
            .iter()
            .map(|key| (key.to_string(), location(key)))
            .collect();
        Catalog::new(relays, locations).expect("test catalog must be consistent")
    }
}
