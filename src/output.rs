// =============================================================================
// output.rs — THE PRESENTATION LAYER
// =============================================================================
//
// One selection, three ways to say it:
//
//   hostnames  one per line, selection order. Pipe it into a shell loop.
//   json       the original catalog document, trimmed to the picked relays
//              and their locations. Feed it to anything that already speaks
//              the relay API format.
//   keyed      `{ hostname: { ...relay fields... } }` in selection order.
// =============================================================================

use clap::ValueEnum;
use serde_json::{Map, Value};
use std::fmt;

use crate::catalog::DocumentShell;
use crate::pipeline::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Hostnames,
    Json,
    Keyed,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Hostnames => write!(f, "hostnames"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Keyed => write!(f, "keyed"),
        }
    }
}

/// Render `selection` as text, ready for stdout.
pub fn render(
    format: OutputFormat,
    selection: &Selection,
    shell: &DocumentShell,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Hostnames => Ok(selection
            .hostnames
            .iter()
            .map(|h| format!("{h}\n"))
            .collect()),
        OutputFormat::Json => {
            let document = shell.render(&selection.catalog)?;
            Ok(format!("{}\n", serde_json::to_string_pretty(&document)?))
        }
        OutputFormat::Keyed => {
            let keyed = keyed_relays(selection)?;
            Ok(format!("{}\n", serde_json::to_string_pretty(&keyed)?))
        }
    }
}

/// Relays keyed by hostname, with the hostname dropped from each body.
fn keyed_relays(selection: &Selection) -> Result<Map<String, Value>, serde_json::Error> {
    let mut keyed = Map::new();
    for relay in selection.relays_in_selection_order() {
        let body = match serde_json::to_value(relay)? {
            Value::Object(fields) => fields.into_iter().filter(|(k, _)| k != "hostname").collect(),
            _ => Map::new(),
        };
        keyed.insert(relay.hostname.clone(), Value::Object(body));
    }
    Ok(keyed)
}
