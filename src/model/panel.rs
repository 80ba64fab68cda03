//! # Reference Haplotype Panel
//!
//! In-memory 0/1 matrix of known single-strain haplotypes, aligned to the
//! same flattened locus index as the read counts, plus the per-locus
//! recombination weights of the copying model.

use crate::data::SampleData;
use crate::error::{DeconvError, Result};
use crate::io::table::PanelTable;

/// Per-base recombination probability used when scaling by physical
/// distance between adjacent loci.
pub const RECOMB_RATE_PER_BASE: f64 = 1.0e-7;

/// Constant switch probability used when no physical distance is known.
pub const CONSTANT_RECOMB_PROB: f64 = 0.01;

/// Reference panel with precomputed copying transition weights.
#[derive(Debug, Clone)]
pub struct Panel {
    /// `bits[locus][haplotype]`
    bits: Vec<Vec<u8>>,
    /// Recombination probability between locus `i - 1` and `i`; zero at
    /// the first locus of each segment.
    rho: Vec<f64>,
}

impl Panel {
    /// Build the panel from a parsed table, checking locus alignment with
    /// the sample data and deriving distance-scaled recombination weights.
    pub fn from_table(table: PanelTable, data: &SampleData) -> Result<Self> {
        if table.bits.len() != data.n_loci() {
            return Err(DeconvError::invalid_input(format!(
                "panel has {} loci but sample data has {}",
                table.bits.len(),
                data.n_loci()
            )));
        }
        for (i, (chrom, pos)) in data.loci().enumerate() {
            if table.chrom[i] != chrom || table.pos[i] != pos {
                return Err(DeconvError::invalid_input(format!(
                    "panel locus {} is {}:{} but sample data has {}:{}",
                    i, table.chrom[i], table.pos[i], chrom, pos
                )));
            }
        }

        let mut rho = vec![0.0; data.n_loci()];
        for s in 0..data.n_segments() {
            let (start, len) = data.segment(s);
            let positions = data.positions(s);
            for offset in 1..len {
                let dist = positions[offset].saturating_sub(positions[offset - 1]) as f64;
                rho[start + offset] = 1.0 - (-RECOMB_RATE_PER_BASE * dist).exp();
            }
        }

        Ok(Self {
            bits: table.bits,
            rho,
        })
    }

    /// Build a panel directly from bits with a constant switch probability.
    pub fn from_bits(bits: Vec<Vec<u8>>) -> Self {
        let n_loci = bits.len();
        let mut rho = vec![CONSTANT_RECOMB_PROB; n_loci];
        if let Some(first) = rho.first_mut() {
            *first = 0.0;
        }
        Self { bits, rho }
    }

    /// Number of reference haplotypes
    pub fn n_panel(&self) -> usize {
        self.bits.first().map_or(0, |row| row.len())
    }

    /// Number of loci
    pub fn n_loci(&self) -> usize {
        self.bits.len()
    }

    /// Allele of panel haplotype `h` at flattened locus `i`
    #[inline]
    pub fn panel_at(&self, i: usize, h: usize) -> u8 {
        self.bits[i][h]
    }

    /// Recombination probability between locus `i - 1` and locus `i`
    #[inline]
    pub fn transition_weight(&self, i: usize) -> f64 {
        self.rho[i]
    }

    /// Probability of copying from the same donor across the transition
    /// into locus `i`: no recombination, or recombining back.
    #[inline]
    pub fn stay_prob(&self, i: usize) -> f64 {
        let rho = self.transition_weight(i);
        (1.0 - rho) + rho / self.n_panel() as f64
    }

    /// Probability of switching to one particular other donor across the
    /// transition into locus `i`.
    #[inline]
    pub fn switch_prob(&self, i: usize) -> f64 {
        self.transition_weight(i) / self.n_panel() as f64
    }
}
