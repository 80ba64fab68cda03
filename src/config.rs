//! # Configuration Logic
//!
//! CLI argument parsing and validation using clap derive.

use clap::Parser;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{DeconvError, Result};
use crate::model::mcmc::McmcSettings;
use crate::model::proportions::PROPOSAL_SIGMA;
use crate::model::single::MISS_COPY_PROB;

/// pfdeconv: deconvolution of mixed P. falciparum infections
#[derive(Parser, Debug, Clone)]
#[command(name = "pfdeconv")]
#[command(version)]
#[command(about = "Deconvolve a mixed-infection sample into strain haplotypes and proportions", long_about = None)]
pub struct Config {
    // ============ Input Files ============
    /// Reference allele count file (CHROM POS COUNT)
    #[arg(long = "ref", value_name = "FILE")]
    pub ref_path: Option<PathBuf>,

    /// Alternative allele count file (CHROM POS COUNT)
    #[arg(long = "alt", value_name = "FILE")]
    pub alt_path: Option<PathBuf>,

    /// Population-level allele frequency file (CHROM POS PLAF)
    #[arg(long = "plaf", value_name = "FILE")]
    pub plaf_path: Option<PathBuf>,

    /// Reference haplotype panel file (CHROM POS then one 0/1 column per haplotype)
    #[arg(long = "panel", value_name = "FILE")]
    pub panel_path: Option<PathBuf>,

    /// Run without a reference panel
    #[arg(long = "no-panel", default_value = "false")]
    pub no_panel: bool,

    // ============ Output ============
    /// Output file name prefix
    #[arg(long, short, value_name = "PREFIX", default_value = "pf3k-pfDeconv")]
    pub out: String,

    /// Output decimal precision
    #[arg(long, short = 'p', default_value = "8")]
    pub precision: usize,

    // ============ Chain Parameters ============
    /// Number of strains K
    #[arg(short, long, default_value = "5")]
    pub k: usize,

    /// Random seed (time-based if not given)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of kept MCMC samples
    #[arg(long = "n-sample", default_value = "1000")]
    pub n_sample: usize,

    /// Thinning rate between kept samples
    #[arg(long, default_value = "5")]
    pub rate: usize,

    /// Burn-in iterations (default: half the sampling phase)
    #[arg(long)]
    pub burnin: Option<usize>,

    /// Per-locus miss-copying probability of the Li-Stephens model
    #[arg(long = "miss-copy", default_value_t = MISS_COPY_PROB)]
    pub miss_copy_prob: f64,

    /// Standard deviation of the proportion proposal on the logit scale
    #[arg(long = "sigma", default_value_t = PROPOSAL_SIGMA)]
    pub proposal_sigma: f64,
}

impl Config {
    /// Parse command line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.ref_path.is_none() {
            return Err(DeconvError::file_name_missing("Ref count"));
        }
        if self.alt_path.is_none() {
            return Err(DeconvError::file_name_missing("Alt count"));
        }
        if self.plaf_path.is_none() {
            return Err(DeconvError::file_name_missing("PLAF"));
        }
        if self.no_panel && self.panel_path.is_some() {
            return Err(DeconvError::invalid_input(
                "--panel conflicts with --no-panel; drop one of the two",
            ));
        }
        if !self.no_panel && self.panel_path.is_none() {
            return Err(DeconvError::file_name_missing("Reference panel"));
        }
        if self.k == 0 {
            return Err(DeconvError::config("number of strains must be at least 1"));
        }
        if self.rate == 0 {
            return Err(DeconvError::config("thinning rate must be at least 1"));
        }
        if self.n_sample == 0 {
            return Err(DeconvError::config("number of samples must be at least 1"));
        }
        if self.proposal_sigma <= 0.0 {
            return Err(DeconvError::config("proposal sigma must be positive"));
        }
        if !(0.0..=1.0).contains(&self.miss_copy_prob) {
            return Err(DeconvError::config(
                "miss-copying probability must be in [0, 1]",
            ));
        }
        Ok(())
    }

    /// Resolved RNG seed: the explicit flag, or wall-clock nanoseconds.
    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
                .unwrap_or(0)
        })
    }

    /// Chain hyperparameters implied by the flags.
    pub fn settings(&self) -> McmcSettings {
        let mut settings = McmcSettings::new(self.k, self.n_sample, self.rate, self.resolved_seed());
        if let Some(burnin) = self.burnin {
            settings.burnin = burnin;
        }
        settings.miss_copy_prob = self.miss_copy_prob;
        settings.proposal_sigma = self.proposal_sigma;
        settings
    }
}
