// =============================================================================
// cli.rs — THE FRONT PANEL
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

use crate::catalog::CatalogSource;
use crate::filter::{FilterCriteria, FilterError};
use crate::output::OutputFormat;

/// Pick random WireGuard relays from the relay catalog, weighted by each
/// relay's weight, never the same relay twice.
///
/// Reads the JSON served by https://api.mullvad.net/public/relays/wireguard/v2
/// and prints the selected hostnames, one per line.
#[derive(Debug, Parser)]
#[command(name = "relay_roulette", version)]
pub struct Cli {
    /// Relay catalog JSON file. Omit it, or pass `-`, to read standard input.
    pub filename: Option<PathBuf>,

    /// Only select active relays.
    #[arg(short = 'a', long = "active")]
    pub active_only: bool,

    /// Only select relays owned by the operator.
    #[arg(short = 'o', long = "owned")]
    pub owned_only: bool,

    /// Only include locations matching this regular expression (matched from
    /// the start of the location key).
    #[arg(short = 'l', long = "location", value_name = "LOCATION_REGEX")]
    pub location_regex: Option<String>,

    /// Only include providers matching this regular expression (matched from
    /// the start of the provider name).
    #[arg(short = 'p', long = "provider", value_name = "PROVIDER_REGEX")]
    pub provider_regex: Option<String>,

    /// Number of matching relays to return.
    #[arg(short = 'n', long = "count", value_name = "NUMBER_OF_ENDPOINTS")]
    pub count: Option<usize>,

    /// Only consider these hostnames. May be repeated.
    #[arg(long = "allow", value_name = "HOSTNAME")]
    pub allow: Vec<String>,

    /// Seed the random generator for a reproducible pick.
    #[arg(long)]
    pub seed: Option<u64>,

    /// What to print.
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl Cli {
    pub fn source(&self) -> CatalogSource {
        CatalogSource::from_arg(self.filename.as_deref())
    }

    /// Build (and compile) the filter criteria the flags ask for.
    pub fn criteria(&self) -> Result<FilterCriteria, FilterError> {
        let mut criteria = FilterCriteria::new()
            .with_active_only(self.active_only)
            .with_owned_only(self.owned_only);
        if let Some(pattern) = &self.location_regex {
            criteria = criteria.with_location_pattern(pattern)?;
        }
        if let Some(pattern) = &self.provider_regex {
            criteria = criteria.with_provider_pattern(pattern)?;
        }
        if !self.allow.is_empty() {
            criteria = criteria.with_allowed_hostnames(self.allow.iter().cloned());
        }
        Ok(criteria)
    }
}
