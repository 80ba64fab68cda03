//! # pfdeconv: Mixed-Infection Deconvolution
//!
//! ## Usage
//! ```bash
//! # With a reference panel
//! pfdeconv --ref sample_ref.txt --alt sample_alt.txt --plaf plaf.txt \
//!          --panel panel.txt -o run1
//!
//! # Without a panel
//! pfdeconv --ref sample_ref.txt --alt sample_alt.txt --plaf plaf.txt \
//!          --no-panel -k 3 --seed 42
//! ```

use std::time::Instant;

use tracing::info;

use pfdeconv::config::Config;
use pfdeconv::data::SampleData;
use pfdeconv::io::output::{OutputWriter, RunMetadata};
use pfdeconv::io::table::{MarkerTable, PanelTable};
use pfdeconv::model::mcmc::McmcEngine;
use pfdeconv::model::panel::Panel;
use pfdeconv::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();

    let config = Config::parse_and_validate()?;
    init_logging();

    let ref_table = MarkerTable::read(config.ref_path.as_ref().unwrap())?;
    let alt_table = MarkerTable::read(config.alt_path.as_ref().unwrap())?;
    let plaf_table = MarkerTable::read(config.plaf_path.as_ref().unwrap())?;
    let data = SampleData::from_tables(&ref_table, &alt_table, &plaf_table)?;

    let panel = match &config.panel_path {
        Some(path) => Some(Panel::from_table(PanelTable::read(path)?, &data)?),
        None => None,
    };

    let settings = config.settings();
    info!(
        loci = data.n_loci(),
        segments = data.n_segments(),
        panel = panel.as_ref().map_or(0, Panel::n_panel),
        seed = settings.seed,
        "inputs loaded"
    );

    let writer = OutputWriter::new(&config.out, config.precision);
    writer.remove_stale();

    let meta = RunMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        seed: settings.seed,
        k_strain: settings.k_strain,
        n_sample: settings.n_sample,
        rate: settings.rate,
        burnin: settings.burnin,
        wall_time: std::time::Duration::ZERO,
    };

    let engine = McmcEngine::new(&data, panel.as_ref(), settings)?;
    let trace = engine.run()?;

    let meta = RunMetadata {
        wall_time: start.elapsed(),
        ..meta
    };
    writer.write_all(&data, &trace, &meta)?;

    info!(
        wall_time_sec = meta.wall_time.as_secs_f64(),
        underflow_skips = trace.underflow_skips,
        "run complete"
    );
    Ok(())
}
