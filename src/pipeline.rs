// =============================================================================
// pipeline.rs — FROM CATALOG TO SHORTLIST
// =============================================================================
//
// The whole trip, in three stops:
//
//   catalog ──(filter: user criteria)──▶ candidates
//   candidates ──(weighted sampler)──▶ hostnames
//   candidates ──(filter: hostnames only)──▶ chosen sub-catalog
//
// The second filter pass runs over the *candidates*, never the full catalog,
// so whatever comes out the far end was already approved by the user's
// criteria. It also means the same sampling run feeds both output shapes:
// the bare hostname list and the reconstructed catalog.
//
// Nothing here keeps state between calls. The randomness is passed in.
// =============================================================================

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::filter::{self, FilterCriteria, FilterError};
use crate::models::{Catalog, Relay};
use crate::sampler::{self, SampleError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("filtering failed")]
    Filter(#[from] FilterError),

    #[error("no relays matched the filter criteria")]
    NoCandidates(#[source] SampleError),

    #[error("sampling failed")]
    Sample(#[from] SampleError),
}

/// Head counts from one run, for the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub catalog_relays: usize,
    pub candidates: usize,
    pub requested: usize,
    pub selected: usize,
}

/// The outcome of one run.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Picked hostnames in selection order (favorite last).
    pub hostnames: Vec<String>,
    /// The candidates restricted to the picked hostnames, in catalog order.
    pub catalog: Catalog,
    pub summary: SelectionSummary,
}

impl Selection {
    /// The picked relays, in selection order rather than catalog order.
    pub fn relays_in_selection_order(&self) -> impl Iterator<Item = &Relay> + '_ {
        self.hostnames.iter().filter_map(|h| self.catalog.relay(h))
    }
}

/// Pick `count` hostnames out of `candidates`, weighted by each relay's weight.
pub fn random_weighted_endpoints<R: Rng + ?Sized>(
    candidates: &Catalog,
    count: usize,
    rng: &mut R,
) -> Result<Vec<String>, SampleError> {
    let (population, weights): (Vec<String>, Vec<f64>) = candidates
        .relays()
        .iter()
        .map(|relay| (relay.hostname.clone(), relay.weight_value()))
        .unzip();

    sampler::sample_with_rng(&population, &weights, count, rng)
}

/// Filter, sample, and filter again.
pub fn select<R: Rng + ?Sized>(
    catalog: &Catalog,
    criteria: &FilterCriteria,
    count: usize,
    rng: &mut R,
) -> Result<Selection, PipelineError> {
    let candidates = filter::apply(catalog, criteria)?;
    if candidates.is_empty() {
        warn!(catalog_relays = catalog.len(), "Filter criteria rejected every relay");
    }

    let hostnames = random_weighted_endpoints(&candidates, count, rng).map_err(|e| match e {
        SampleError::EmptyPopulation => PipelineError::NoCandidates(e),
        other => PipelineError::Sample(other),
    })?;

    let chosen = filter::apply(&candidates, &FilterCriteria::allow_only(hostnames.iter().cloned()))?;

    for relay in chosen.relays() {
        debug!(relay = %relay, "Picked");
    }

    let summary = SelectionSummary {
        catalog_relays: catalog.len(),
        candidates: candidates.len(),
        requested: count,
        selected: hostnames.len(),
    };
    debug!(?summary, "Pipeline finished");

    Ok(Selection {
        hostnames,
        catalog: chosen,
        summary,
    })
}
