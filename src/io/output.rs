//! # Output Writers
//!
//! Writes the four result files at the configured prefix: `.llk` (total
//! log-likelihood per kept sample), `.hap` (final haplotype matrix),
//! `.prop` (proportion trace) and `.log` (run metadata). Stale files with
//! the same names are removed before the chain starts.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::data::SampleData;
use crate::error::Result;
use crate::model::mcmc::McmcTrace;

/// Destination paths and formatting for one run's outputs.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    llk_path: PathBuf,
    hap_path: PathBuf,
    prop_path: PathBuf,
    log_path: PathBuf,
    precision: usize,
}

impl OutputWriter {
    pub fn new(prefix: &str, precision: usize) -> Self {
        Self {
            llk_path: PathBuf::from(format!("{}.llk", prefix)),
            hap_path: PathBuf::from(format!("{}.hap", prefix)),
            prop_path: PathBuf::from(format!("{}.prop", prefix)),
            log_path: PathBuf::from(format!("{}.log", prefix)),
            precision,
        }
    }

    /// Remove leftover outputs from a previous run with the same prefix.
    pub fn remove_stale(&self) {
        for path in [&self.llk_path, &self.hap_path, &self.prop_path, &self.log_path] {
            let _ = fs::remove_file(path);
        }
    }

    /// Write all four outputs from the finished chain.
    pub fn write_all(
        &self,
        data: &SampleData,
        trace: &McmcTrace,
        meta: &RunMetadata,
    ) -> Result<()> {
        self.write_llk(trace)?;
        self.write_prop(trace)?;
        self.write_hap(data, trace)?;
        self.write_log(meta, trace)?;
        Ok(())
    }

    fn write_llk(&self, trace: &McmcTrace) -> Result<()> {
        let mut w = BufWriter::new(File::create(&self.llk_path)?);
        for &llk in &trace.llk {
            writeln!(w, "{:.*}", self.precision, llk)?;
        }
        Ok(())
    }

    fn write_prop(&self, trace: &McmcTrace) -> Result<()> {
        let mut w = BufWriter::new(File::create(&self.prop_path)?);
        for row in &trace.proportions {
            let line = row
                .iter()
                .map(|p| format!("{:.*}", self.precision, p))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(w, "{}", line)?;
        }
        Ok(())
    }

    fn write_hap(&self, data: &SampleData, trace: &McmcTrace) -> Result<()> {
        let mut w = BufWriter::new(File::create(&self.hap_path)?);
        let k = trace.final_haplotypes.first().map_or(0, |row| row.len());

        let header: Vec<String> = ["CHROM".to_string(), "POS".to_string()]
            .into_iter()
            .chain((1..=k).map(|i| format!("h{}", i)))
            .collect();
        writeln!(w, "{}", header.join("\t"))?;

        for ((chrom, pos), row) in data.loci().zip(trace.final_haplotypes.iter()) {
            let bits = row
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(w, "{}\t{}\t{}", chrom, pos, bits)?;
        }
        Ok(())
    }

    fn write_log(&self, meta: &RunMetadata, trace: &McmcTrace) -> Result<()> {
        let mut w = BufWriter::new(File::create(&self.log_path)?);
        writeln!(w, "pfdeconv {}", meta.version)?;
        writeln!(w, "seed\t{}", meta.seed)?;
        writeln!(w, "kStrain\t{}", meta.k_strain)?;
        writeln!(w, "nSample\t{}", meta.n_sample)?;
        writeln!(w, "rate\t{}", meta.rate)?;
        writeln!(w, "burnin\t{}", meta.burnin)?;
        writeln!(w, "underflowSkips\t{}", trace.underflow_skips)?;
        writeln!(w, "wallTimeSec\t{:.3}", meta.wall_time.as_secs_f64())?;
        Ok(())
    }
}

/// Run metadata recorded in the `.log` file.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub version: String,
    pub seed: u64,
    pub k_strain: usize,
    pub n_sample: usize,
    pub rate: usize,
    pub burnin: usize,
    pub wall_time: Duration,
}
