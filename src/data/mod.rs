//! # Sample Data Context
//!
//! Immutable per-locus inputs shared by every updater: reference and
//! alternative read counts, the population-level allele frequency prior,
//! and the chromosome segment index. Built once from the input tables and
//! passed around by shared reference for the lifetime of the chain.

use crate::error::{DeconvError, Result};
use crate::io::table::MarkerTable;

/// Read counts, PLAF prior and segment layout for one patient sample.
#[derive(Debug, Clone)]
pub struct SampleData {
    /// Chromosome name of each segment
    chrom: Vec<String>,
    /// Physical positions, one vector per segment
    positions: Vec<Vec<u64>>,
    /// Flattened-locus index at which each segment starts, strictly increasing
    segment_starts: Vec<usize>,
    /// Reference allele read count per locus
    ref_count: Vec<f64>,
    /// Alternative allele read count per locus
    alt_count: Vec<f64>,
    /// Population-level alternative allele frequency per locus
    plaf: Vec<f64>,
}

impl SampleData {
    /// Assemble the context from per-segment positions and flattened
    /// per-locus vectors, checking the data-model invariants.
    pub fn from_parts(
        chrom: Vec<String>,
        positions: Vec<Vec<u64>>,
        ref_count: Vec<f64>,
        alt_count: Vec<f64>,
        plaf: Vec<f64>,
    ) -> Result<Self> {
        if chrom.len() != positions.len() {
            return Err(DeconvError::invalid_input(
                "chromosome and position lists have different lengths",
            ));
        }
        let n_loci: usize = positions.iter().map(|p| p.len()).sum();
        if ref_count.len() != n_loci || alt_count.len() != n_loci || plaf.len() != n_loci {
            return Err(DeconvError::invalid_input(format!(
                "locus count mismatch: {} positions, {} ref counts, {} alt counts, {} PLAF values",
                n_loci,
                ref_count.len(),
                alt_count.len(),
                plaf.len()
            )));
        }
        if n_loci == 0 {
            return Err(DeconvError::invalid_input("no loci in input"));
        }
        for (i, &p) in plaf.iter().enumerate() {
            if !(0.0..=1.0).contains(&p) {
                return Err(DeconvError::invalid_input(format!(
                    "PLAF {} at locus {} is outside [0, 1]",
                    p, i
                )));
            }
        }
        if ref_count.iter().chain(alt_count.iter()).any(|&c| c < 0.0) {
            return Err(DeconvError::invalid_input("negative read count"));
        }

        let mut segment_starts = Vec::with_capacity(positions.len());
        let mut start = 0;
        for seg in &positions {
            if seg.is_empty() {
                return Err(DeconvError::invalid_input("empty chromosome segment"));
            }
            segment_starts.push(start);
            start += seg.len();
        }

        Ok(Self {
            chrom,
            positions,
            segment_starts,
            ref_count,
            alt_count,
            plaf,
        })
    }

    /// Build the context from the three input tables, verifying that their
    /// loci line up row for row.
    pub fn from_tables(
        ref_table: &MarkerTable,
        alt_table: &MarkerTable,
        plaf_table: &MarkerTable,
    ) -> Result<Self> {
        if ref_table.n_loci() != alt_table.n_loci() {
            return Err(DeconvError::invalid_input(format!(
                "reference count file has {} loci but alternative count file has {}",
                ref_table.n_loci(),
                alt_table.n_loci()
            )));
        }
        if ref_table.n_loci() != plaf_table.n_loci() {
            return Err(DeconvError::invalid_input(format!(
                "count files have {} loci but PLAF file has {}",
                ref_table.n_loci(),
                plaf_table.n_loci()
            )));
        }
        for i in 0..ref_table.n_loci() {
            if ref_table.chrom[i] != alt_table.chrom[i]
                || ref_table.pos[i] != alt_table.pos[i]
                || ref_table.chrom[i] != plaf_table.chrom[i]
                || ref_table.pos[i] != plaf_table.pos[i]
            {
                return Err(DeconvError::invalid_input(format!(
                    "locus {} differs across input files: ref {}:{}, alt {}:{}, plaf {}:{}",
                    i,
                    ref_table.chrom[i],
                    ref_table.pos[i],
                    alt_table.chrom[i],
                    alt_table.pos[i],
                    plaf_table.chrom[i],
                    plaf_table.pos[i]
                )));
            }
        }

        let (chrom, positions) = plaf_table.group_by_chrom();
        Self::from_parts(
            chrom,
            positions,
            ref_table.value.clone(),
            alt_table.value.clone(),
            plaf_table.value.clone(),
        )
    }

    /// Total number of loci across all segments
    pub fn n_loci(&self) -> usize {
        self.ref_count.len()
    }

    /// Number of chromosome segments
    pub fn n_segments(&self) -> usize {
        self.segment_starts.len()
    }

    /// Flattened start index and length of segment `s`
    pub fn segment(&self, s: usize) -> (usize, usize) {
        (self.segment_starts[s], self.positions[s].len())
    }

    /// Chromosome name of segment `s`
    pub fn chrom(&self, s: usize) -> &str {
        &self.chrom[s]
    }

    /// Physical positions of segment `s`
    pub fn positions(&self, s: usize) -> &[u64] {
        &self.positions[s]
    }

    pub fn ref_count(&self) -> &[f64] {
        &self.ref_count
    }

    pub fn alt_count(&self) -> &[f64] {
        &self.alt_count
    }

    pub fn plaf(&self) -> &[f64] {
        &self.plaf
    }

    /// Iterate `(chrom, pos)` over all loci in flattened order
    pub fn loci(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.chrom
            .iter()
            .zip(self.positions.iter())
            .flat_map(|(c, ps)| ps.iter().map(move |&p| (c.as_str(), p)))
    }
}
