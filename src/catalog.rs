// =============================================================================
// catalog.rs — THE CATALOG LOADING DOCK
// =============================================================================
//
// The relay catalog comes from the public relay API
// (https://api.mullvad.net/public/relays/wireguard/v2), saved to a file or
// piped straight in on stdin. It looks roughly like this:
//
//   {
//     "locations": { "se-sto": { "city": "Stockholm", ... }, ... },
//     "wireguard": {
//       "port_ranges": [...], "ipv4_gateway": "...", ...
//       "relays": [ { "hostname": "se-sto-wg-001", "location": "se-sto", ... } ]
//     }
//   }
//
// Loading happens in three checks, and the first failure wins:
//
//   1. Is it JSON with a location table and a relay list?
//   2. Does every relay have the fields we need? (we say WHICH relay doesn't)
//   3. Are hostnames unique and do all location keys resolve?
//
// Everything in the document we don't model is kept in a `DocumentShell`, so
// the filtered catalog can be put back into the same envelope on the way out.
// =============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Catalog, CatalogError, LocationTable, Relay};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read catalog from {origin}")]
    Read {
        origin: CatalogSource,
        #[source]
        source: io::Error,
    },

    #[error("catalog from {origin} is not a valid relay document")]
    Parse {
        origin: CatalogSource,
        #[source]
        source: serde_json::Error,
    },

    #[error("relay #{index} ({hostname}) is malformed")]
    MalformedRelay {
        index: usize,
        hostname: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Inconsistent(#[from] CatalogError),
}

/// Where the catalog JSON comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Stdin,
    File(PathBuf),
}

impl CatalogSource {
    /// No argument, or `-`, means stdin.
    pub fn from_arg(arg: Option<&Path>) -> Self {
        match arg {
            Some(path) if path != Path::new("-") => CatalogSource::File(path.to_path_buf()),
            _ => CatalogSource::Stdin,
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::Stdin => write!(f, "<stdin>"),
            CatalogSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

const LOCATIONS: &str = "locations";
const WIREGUARD: &str = "wireguard";
const RELAYS: &str = "relays";

/// The two parts of the document we type. Everything else stays in the
/// `DocumentShell`.
#[derive(Debug, Deserialize)]
struct RawDocument {
    locations: LocationTable,
    wireguard: RawWireguard,
}

#[derive(Debug, Deserialize)]
struct RawWireguard {
    relays: Vec<Value>,
}

/// The source document with its location table and relay list emptied out.
/// The keys stay in place, so a rendered document lists everything in the
/// order it arrived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentShell {
    document: Map<String, Value>,
}

impl DocumentShell {
    fn hollow(mut document: Map<String, Value>) -> Self {
        document.insert(LOCATIONS.to_string(), Value::Object(Map::new()));
        if let Some(Value::Object(wireguard)) = document.get_mut(WIREGUARD) {
            wireguard.insert(RELAYS.to_string(), Value::Array(Vec::new()));
        }
        Self { document }
    }

    /// Put `catalog` back into the original envelope.
    pub fn render(&self, catalog: &Catalog) -> Result<Value, serde_json::Error> {
        let mut document = self.document.clone();
        document.insert(LOCATIONS.to_string(), serde_json::to_value(catalog.locations())?);

        let wireguard = document
            .entry(WIREGUARD)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(wireguard) = wireguard {
            wireguard.insert(RELAYS.to_string(), serde_json::to_value(catalog.relays())?);
        }

        Ok(Value::Object(document))
    }
}

/// A validated catalog plus the envelope it arrived in.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub shell: DocumentShell,
}

/// Read and validate the catalog from `source`.
pub fn load(source: &CatalogSource) -> Result<LoadedCatalog, LoadError> {
    match source {
        CatalogSource::Stdin => from_reader(io::stdin().lock(), source),
        CatalogSource::File(path) => {
            let file = File::open(path).map_err(|e| LoadError::Read {
                origin: source.clone(),
                source: e,
            })?;
            from_reader(BufReader::new(file), source)
        }
    }
}

/// Parse and validate a catalog document from any reader. `origin` is only
/// used for error messages and logs.
pub fn from_reader<R: Read>(reader: R, origin: &CatalogSource) -> Result<LoadedCatalog, LoadError> {
    let document: Map<String, Value> = serde_json::from_reader(reader).map_err(|e| {
        if e.is_io() {
            LoadError::Read {
                origin: origin.clone(),
                source: e.into(),
            }
        } else {
            LoadError::Parse {
                origin: origin.clone(),
                source: e,
            }
        }
    })?;
    let raw = RawDocument::deserialize(&Value::Object(document.clone())).map_err(|source| LoadError::Parse {
        origin: origin.clone(),
        source,
    })?;
    let shell = DocumentShell::hollow(document);

    let mut relays = Vec::with_capacity(raw.wireguard.relays.len());
    for (index, value) in raw.wireguard.relays.into_iter().enumerate() {
        let hostname = value
            .get("hostname")
            .and_then(Value::as_str)
            .unwrap_or("<no hostname>")
            .to_string();
        let relay: Relay = serde_json::from_value(value)
            .map_err(|source| LoadError::MalformedRelay { index, hostname, source })?;
        relays.push(relay);
    }

    let relay_count = relays.len();
    let location_count = raw.locations.len();
    let catalog = Catalog::new(relays, raw.locations)?;

    info!(
        origin = %origin,
        relays = relay_count,
        locations = location_count,
        "Relay catalog loaded"
    );
    debug!(
        top_level_fields = shell.document.len(),
        "Document envelope retained for output"
    );

    Ok(LoadedCatalog { catalog, shell })
}
