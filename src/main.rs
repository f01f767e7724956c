// ██████╗ ███████╗██╗      █████╗ ██╗   ██╗
// ██╔══██╗██╔════╝██║     ██╔══██╗╚██╗ ██╔╝
// ██████╔╝█████╗  ██║     ███████║ ╚████╔╝
// ██╔══██╗██╔══╝  ██║     ██╔══██║  ╚██╔╝
// ██║  ██║███████╗███████╗██║  ██║   ██║
// ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝  ╚═╝   ╚═╝
//
// R O U L E T T E
//
// Hand it the relay catalog, tell it what you like, and it spins a weighted
// wheel to pick a few WireGuard relays. Never the same one twice.
//
//   curl -s https://api.mullvad.net/public/relays/wireguard/v2 | relay_roulette -a -l '^se' -n 3

mod catalog;
mod cli;
mod config;
mod filter;
mod models;
mod output;
mod pipeline;
mod sampler;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Cli;
use crate::config::Config;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries the picks, so logs go to stderr.
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    // Patterns are compiled before anything is read.
    let criteria = cli.criteria().context("invalid filter configuration")?;

    let source = cli.source();
    let loaded = catalog::load(&source)
        .with_context(|| format!("could not load the relay catalog from {source}"))?;

    let count = cli.count.unwrap_or(config.default_count);
    let format = cli.format.unwrap_or(config.output_format);
    let mut rng: Box<dyn RngCore> = match cli.seed.or(config.seed) {
        Some(seed) => {
            info!(seed, "🎲 Using a fixed seed");
            Box::new(StdRng::seed_from_u64(seed))
        }
        None => Box::new(rand::thread_rng()),
    };
    debug!(count, %format, "🎰 Spinning the wheel");

    let selection = pipeline::select(&loaded.catalog, &criteria, count, &mut *rng)?;
    let summary = &selection.summary;
    info!(
        catalog_relays = summary.catalog_relays,
        candidates = summary.candidates,
        requested = summary.requested,
        selected = summary.selected,
        "🎯 Relay selection complete"
    );

    let rendered = output::render(format, &selection, &loaded.shell)
        .context("could not serialize the selection")?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(&config);
    debug!(?config, "Configuration loaded");

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("relay_roulette: {err:#}");
            ExitCode::FAILURE
        }
    }
}
