// =============================================================================
// config.rs — THE KNOB DRAWER
// =============================================================================
//
// Defaults for everything the command line does not say. Values come from
// environment variables prefixed with RELAY_ROULETTE_, optionally seeded from
// a `.env` file in the working directory. Anything missing or unparsable
// quietly falls back to its default; flags on the command line always win.
// =============================================================================

use clap::ValueEnum;
use std::env;

use crate::output::OutputFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// How many relays to pick when `-n` is not given. Default: 5.
    pub default_count: usize,

    /// Fixed RNG seed, for reproducible picks. Default: none (fresh entropy
    /// every run).
    pub seed: Option<u64>,

    /// Output format when `--format` is not given. Default: hostnames.
    pub output_format: OutputFormat,

    /// Log filter used when RUST_LOG is not set. Default: "warn", because
    /// stdout is for hostnames and stderr should stay quiet unless asked.
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load from the process environment (and `.env`, if there is one).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. `from_env` is this with
    /// `std::env::var` plugged in.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Config {
            default_count: var("RELAY_ROULETTE_COUNT", "5").trim().parse().unwrap_or(5),

            seed: lookup("RELAY_ROULETTE_SEED").and_then(|s| s.trim().parse().ok()),

            output_format: OutputFormat::from_str(var("RELAY_ROULETTE_FORMAT", "hostnames").trim(), true)
                .unwrap_or_default(),

            log_level: var("RELAY_ROULETTE_LOG_LEVEL", "warn"),

            log_json: parse_flag(&var("RELAY_ROULETTE_LOG_JSON", "false")),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
