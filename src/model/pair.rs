//! # Pair-Strain Haplotype Updater
//!
//! Joint resample of two strains' haplotypes over a segment. Single-strain
//! updates stall when swapping two strains' alleles leaves the expected
//! WSAF unchanged; the paired move walks both haplotypes at once over the
//! product state space (donor pairs), with the transition factorised per
//! strain so each locus costs O(H^2) rather than O(H^4).

use rand::rngs::StdRng;
use rand::Rng;

use crate::data::SampleData;
use crate::error::Result;
use crate::model::hmm::{self, CopyingSpace};
use crate::model::panel::Panel;
use crate::model::single::sample_strain_by_proportion;
use crate::model::stats::{cdf, sample_index_by_cdf, site_llk};

/// Draw two distinct strain indices without replacement, each with
/// probability proportional to its remaining mixture weight.
pub fn sample_distinct_strains(proportions: &[f64], rng: &mut StdRng) -> (usize, usize) {
    debug_assert!(proportions.len() >= 2);
    let first = sample_strain_by_proportion(proportions, rng);

    let mut remaining = proportions.to_vec();
    remaining[first] = 0.0;
    let c = cdf(&remaining);
    let u = rng.gen::<f64>() * c[c.len() - 1];
    let second = sample_index_by_cdf(&c, u);
    (first, second)
}

/// Donor-pair state space: state `j1 * H + j2` copies strain one from
/// donor `j1` and strain two from donor `j2`.
struct PairStrainSpace<'a> {
    panel: &'a Panel,
    segment_start: usize,
    /// Scaled likelihoods indexed `[t][2 * bit1 + bit2]`
    emissions: Vec<[f64; 4]>,
}

impl<'a> PairStrainSpace<'a> {
    fn new(panel: &'a Panel, segment_start: usize, llks: &[Vec<f64>; 4]) -> Self {
        let len = llks[0].len();
        let emissions = (0..len)
            .map(|t| {
                let row = [llks[0][t], llks[1][t], llks[2][t], llks[3][t]];
                let m = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                [
                    (row[0] - m).exp(),
                    (row[1] - m).exp(),
                    (row[2] - m).exp(),
                    (row[3] - m).exp(),
                ]
            })
            .collect();
        Self {
            panel,
            segment_start,
            emissions,
        }
    }

    fn n_panel(&self) -> usize {
        self.panel.n_panel()
    }
}

impl CopyingSpace for PairStrainSpace<'_> {
    fn n_states(&self) -> usize {
        self.n_panel() * self.n_panel()
    }

    fn n_loci(&self) -> usize {
        self.emissions.len()
    }

    #[inline]
    fn emission(&self, t: usize, state: usize) -> f64 {
        let h = self.n_panel();
        let i = self.segment_start + t;
        let bit1 = self.panel.panel_at(i, state / h);
        let bit2 = self.panel.panel_at(i, state % h);
        self.emissions[t][(2 * bit1 + bit2) as usize]
    }

    fn fold_transitions(&self, t: usize, prev: &[f64], out: &mut [f64]) {
        let h = self.n_panel();
        let i = self.segment_start + t;
        let switch = self.panel.switch_prob(i);
        // per-strain no-recombination mass kept on the same donor
        let keep = self.panel.stay_prob(i) - switch;

        let mut total = 0.0;
        let mut row_marg = vec![0.0; h];
        let mut col_marg = vec![0.0; h];
        for j1 in 0..h {
            for j2 in 0..h {
                let p = prev[j1 * h + j2];
                row_marg[j1] += p;
                col_marg[j2] += p;
                total += p;
            }
        }

        for j1 in 0..h {
            for j2 in 0..h {
                let s = j1 * h + j2;
                out[s] = keep * keep * prev[s]
                    + keep * switch * (row_marg[j1] + col_marg[j2])
                    + switch * switch * total;
            }
        }
    }

    #[inline]
    fn backsample_weight(&self, t_next: usize, state: usize, next: usize) -> f64 {
        let h = self.n_panel();
        let i = self.segment_start + t_next;
        let stay = self.panel.stay_prob(i);
        let switch = self.panel.switch_prob(i);

        let f1 = if state / h == next / h { stay } else { switch };
        let f2 = if state % h == next % h { stay } else { switch };
        f1 * f2
    }
}

/// Proposed joint replacement for two strains' haplotypes over a segment.
#[derive(Debug, Clone)]
pub struct PairHapUpdate {
    pub strain1: usize,
    pub strain2: usize,
    pub segment_start: usize,
    pub bits1: Vec<u8>,
    pub bits2: Vec<u8>,
    /// Expected WSAF implied by the new bit pairs
    pub wsaf: Vec<f64>,
    /// Per-locus log-likelihoods under the new WSAF
    pub site_llks: Vec<f64>,
}

/// Pair-strain updater over the shared data context.
pub struct PairHapSampler<'a> {
    data: &'a SampleData,
    panel: Option<&'a Panel>,
    miss_copy_prob: f64,
}

impl<'a> PairHapSampler<'a> {
    pub fn new(data: &'a SampleData, panel: Option<&'a Panel>, miss_copy_prob: f64) -> Self {
        Self {
            data,
            panel,
            miss_copy_prob,
        }
    }

    /// Jointly resample two strains' haplotypes over segment `segment`.
    pub fn propose(
        &self,
        segment: usize,
        proportions: &[f64],
        haplotypes: &[Vec<u8>],
        wsaf: &[f64],
        rng: &mut StdRng,
    ) -> Result<PairHapUpdate> {
        let (start, len) = self.data.segment(segment);
        let (strain1, strain2) = sample_distinct_strains(proportions, rng);
        let (p1, p2) = (proportions[strain1], proportions[strain2]);

        let ref_count = self.data.ref_count();
        let alt_count = self.data.alt_count();

        // Candidate WSAFs for the four joint bit assignments, indexed
        // `2 * bit1 + bit2`.
        let mut wsafs: [Vec<f64>; 4] = Default::default();
        for t in 0..len {
            let i = start + t;
            let others = (wsaf[i]
                - p1 * haplotypes[i][strain1] as f64
                - p2 * haplotypes[i][strain2] as f64)
                .clamp(0.0, 1.0);
            wsafs[0].push(others);
            wsafs[1].push((others + p2).min(1.0));
            wsafs[2].push((others + p1).min(1.0));
            wsafs[3].push((others + p1 + p2).min(1.0));
        }
        let llks: [Vec<f64>; 4] = std::array::from_fn(|b| {
            (0..len)
                .map(|t| site_llk(ref_count[start + t], alt_count[start + t], wsafs[b][t]))
                .collect()
        });

        let (bits1, bits2) = match self.panel {
            Some(panel) => self.sample_by_copying(panel, start, &llks, rng)?,
            None => self.sample_independently(start, len, &llks, rng),
        };

        let mut new_wsaf = Vec::with_capacity(len);
        let mut new_llks = Vec::with_capacity(len);
        for t in 0..len {
            let b = (2 * bits1[t] + bits2[t]) as usize;
            new_wsaf.push(wsafs[b][t]);
            new_llks.push(llks[b][t]);
        }

        Ok(PairHapUpdate {
            strain1,
            strain2,
            segment_start: start,
            bits1,
            bits2,
            wsaf: new_wsaf,
            site_llks: new_llks,
        })
    }

    /// Joint HMM pass over donor pairs, then miss-copying per strain.
    fn sample_by_copying(
        &self,
        panel: &Panel,
        start: usize,
        llks: &[Vec<f64>; 4],
        rng: &mut StdRng,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let space = PairStrainSpace::new(panel, start, llks);
        let fwd = hmm::forward(&space, start)?;
        let path = hmm::sample_path(&space, &fwd, start, rng)?;

        let h = panel.n_panel();
        let mut bits1 = Vec::with_capacity(path.len());
        let mut bits2 = Vec::with_capacity(path.len());
        for (t, &pair) in path.iter().enumerate() {
            let i = start + t;
            let mut b1 = panel.panel_at(i, pair / h);
            let mut b2 = panel.panel_at(i, pair % h);
            if rng.gen::<f64>() < self.miss_copy_prob {
                b1 ^= 1;
            }
            if rng.gen::<f64>() < self.miss_copy_prob {
                b2 ^= 1;
            }
            bits1.push(b1);
            bits2.push(b2);
        }
        Ok((bits1, bits2))
    }

    /// No panel: sample the joint assignment at each locus from the
    /// PLAF-product-weighted likelihood.
    fn sample_independently(
        &self,
        start: usize,
        len: usize,
        llks: &[Vec<f64>; 4],
        rng: &mut StdRng,
    ) -> (Vec<u8>, Vec<u8>) {
        let plaf = self.data.plaf();
        let mut bits1 = Vec::with_capacity(len);
        let mut bits2 = Vec::with_capacity(len);

        for t in 0..len {
            let p = plaf[start + t];
            let prior = [
                (1.0 - p) * (1.0 - p),
                (1.0 - p) * p,
                p * (1.0 - p),
                p * p,
            ];
            let m = (0..4).map(|b| llks[b][t]).fold(f64::NEG_INFINITY, f64::max);
            let weights: Vec<f64> = (0..4)
                .map(|b| prior[b] * (llks[b][t] - m).exp())
                .collect();
            let c = cdf(&weights);
            let u = rng.gen::<f64>() * c[c.len() - 1];
            let b = sample_index_by_cdf(&c, u);
            bits1.push((b / 2) as u8);
            bits2.push((b % 2) as u8);
        }
        (bits1, bits2)
    }
}
