//! # pfdeconv Library
//!
//! Deconvolution of mixed Plasmodium falciparum infections: given
//! per-locus reference/alternative read counts, a population-level allele
//! frequency prior, and optionally a reference haplotype panel, an MCMC
//! chain jointly infers the mixture proportions of K latent strains and
//! each strain's haplotype.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: immutable per-locus inputs and the chromosome segment index
//! - `error`: error types and result alias
//! - `io`: input table readers and output writers
//! - `model`: numerics, panel, HMM updaters, proportion updater, engine

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;

pub use config::Config;
pub use data::SampleData;
pub use error::{DeconvError, Result};
pub use io::{MarkerTable, OutputWriter};
pub use model::{McmcEngine, McmcSettings, McmcTrace, Panel};
