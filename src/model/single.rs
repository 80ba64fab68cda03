//! # Single-Strain Haplotype Updater
//!
//! Gibbs-like resample of one strain's haplotype across a chromosome
//! segment, conditional on the other strains and the current mixture
//! proportions. With a reference panel the new haplotype is drawn from a
//! Li-Stephens copying HMM over the panel donors; without one, each locus
//! is drawn independently from the PLAF-weighted likelihood.

use rand::rngs::StdRng;
use rand::Rng;

use crate::data::SampleData;
use crate::error::Result;
use crate::model::hmm::{self, CopyingSpace};
use crate::model::panel::Panel;
use crate::model::stats::{cdf, sample_index_by_cdf, site_llk};

/// Li-Stephens miss-copying probability: per-locus chance of flipping
/// the copied donor allele.
pub const MISS_COPY_PROB: f64 = 0.01;

/// Pick a strain index with probability proportional to its mixture
/// proportion.
pub fn sample_strain_by_proportion(proportions: &[f64], rng: &mut StdRng) -> usize {
    let c = cdf(proportions);
    let u = rng.gen::<f64>() * c[c.len() - 1];
    sample_index_by_cdf(&c, u)
}

/// Per-locus emissions over panel donors for one strain.
///
/// `emissions[t]` holds the scaled likelihood of the data when the donor
/// contributes allele 0 or 1 at segment offset `t`; the donor's panel bit
/// selects which of the two applies to each state.
struct SingleStrainSpace<'a> {
    panel: &'a Panel,
    segment_start: usize,
    emissions: Vec<[f64; 2]>,
}

impl<'a> SingleStrainSpace<'a> {
    fn new(panel: &'a Panel, segment_start: usize, llk0: &[f64], llk1: &[f64]) -> Self {
        let emissions = llk0
            .iter()
            .zip(llk1.iter())
            .map(|(&l0, &l1)| {
                let m = l0.max(l1);
                [(l0 - m).exp(), (l1 - m).exp()]
            })
            .collect();
        Self {
            panel,
            segment_start,
            emissions,
        }
    }
}

impl CopyingSpace for SingleStrainSpace<'_> {
    fn n_states(&self) -> usize {
        self.panel.n_panel()
    }

    fn n_loci(&self) -> usize {
        self.emissions.len()
    }

    #[inline]
    fn emission(&self, t: usize, state: usize) -> f64 {
        let bit = self.panel.panel_at(self.segment_start + t, state);
        self.emissions[t][bit as usize]
    }

    fn fold_transitions(&self, t: usize, prev: &[f64], out: &mut [f64]) {
        let i = self.segment_start + t;
        let stay = self.panel.stay_prob(i);
        let switch = self.panel.switch_prob(i);
        let total: f64 = prev.iter().sum();
        // stay - switch is the no-recombination mass kept on the same donor
        for (s, o) in out.iter_mut().enumerate() {
            *o = (stay - switch) * prev[s] + switch * total;
        }
    }

    #[inline]
    fn backsample_weight(&self, t_next: usize, state: usize, next: usize) -> f64 {
        let i = self.segment_start + t_next;
        if state == next {
            self.panel.stay_prob(i)
        } else {
            self.panel.switch_prob(i)
        }
    }
}

/// Proposed replacement for one strain's haplotype over one segment.
#[derive(Debug, Clone)]
pub struct SingleHapUpdate {
    pub strain: usize,
    pub segment_start: usize,
    /// New haplotype bits over the segment
    pub bits: Vec<u8>,
    /// Expected WSAF implied by the new bits
    pub wsaf: Vec<f64>,
    /// Per-locus log-likelihoods under the new WSAF
    pub site_llks: Vec<f64>,
}

/// Single-strain updater over the shared data context.
pub struct SingleHapSampler<'a> {
    data: &'a SampleData,
    panel: Option<&'a Panel>,
    miss_copy_prob: f64,
}

impl<'a> SingleHapSampler<'a> {
    pub fn new(data: &'a SampleData, panel: Option<&'a Panel>, miss_copy_prob: f64) -> Self {
        Self {
            data,
            panel,
            miss_copy_prob,
        }
    }

    /// Resample one strain's haplotype over segment `segment`.
    ///
    /// The strain is drawn with probability proportional to `proportions`;
    /// heavier strains are revisited more often.
    pub fn propose(
        &self,
        segment: usize,
        proportions: &[f64],
        haplotypes: &[Vec<u8>],
        wsaf: &[f64],
        rng: &mut StdRng,
    ) -> Result<SingleHapUpdate> {
        let (start, len) = self.data.segment(segment);
        let strain = sample_strain_by_proportion(proportions, rng);
        let p_k = proportions[strain];

        let ref_count = self.data.ref_count();
        let alt_count = self.data.alt_count();

        // Candidate WSAFs with this strain's bit forced to 0 or 1.
        let mut wsaf0 = Vec::with_capacity(len);
        let mut wsaf1 = Vec::with_capacity(len);
        for t in 0..len {
            let i = start + t;
            let others = (wsaf[i] - p_k * haplotypes[i][strain] as f64).clamp(0.0, 1.0);
            wsaf0.push(others);
            wsaf1.push((others + p_k).min(1.0));
        }
        let llk0: Vec<f64> = (0..len)
            .map(|t| site_llk(ref_count[start + t], alt_count[start + t], wsaf0[t]))
            .collect();
        let llk1: Vec<f64> = (0..len)
            .map(|t| site_llk(ref_count[start + t], alt_count[start + t], wsaf1[t]))
            .collect();

        let bits = match self.panel {
            Some(panel) => self.sample_by_copying(panel, start, &llk0, &llk1, rng)?,
            None => self.sample_independently(start, len, &llk0, &llk1, rng),
        };

        let mut new_wsaf = Vec::with_capacity(len);
        let mut new_llks = Vec::with_capacity(len);
        for t in 0..len {
            if bits[t] == 1 {
                new_wsaf.push(wsaf1[t]);
                new_llks.push(llk1[t]);
            } else {
                new_wsaf.push(wsaf0[t]);
                new_llks.push(llk0[t]);
            }
        }

        Ok(SingleHapUpdate {
            strain,
            segment_start: start,
            bits,
            wsaf: new_wsaf,
            site_llks: new_llks,
        })
    }

    /// HMM pass over the panel, then miss-copying on the sampled donors.
    fn sample_by_copying(
        &self,
        panel: &Panel,
        start: usize,
        llk0: &[f64],
        llk1: &[f64],
        rng: &mut StdRng,
    ) -> Result<Vec<u8>> {
        let space = SingleStrainSpace::new(panel, start, llk0, llk1);
        let fwd = hmm::forward(&space, start)?;
        let path = hmm::sample_path(&space, &fwd, start, rng)?;

        let bits = path
            .iter()
            .enumerate()
            .map(|(t, &donor)| {
                let mut bit = panel.panel_at(start + t, donor);
                if rng.gen::<f64>() < self.miss_copy_prob {
                    bit ^= 1;
                }
                bit
            })
            .collect();
        Ok(bits)
    }

    /// No panel: sample each locus from the PLAF-weighted likelihood.
    fn sample_independently(
        &self,
        start: usize,
        len: usize,
        llk0: &[f64],
        llk1: &[f64],
        rng: &mut StdRng,
    ) -> Vec<u8> {
        let plaf = self.data.plaf();
        (0..len)
            .map(|t| {
                let m = llk0[t].max(llk1[t]);
                let w0 = (1.0 - plaf[start + t]) * (llk0[t] - m).exp();
                let w1 = plaf[start + t] * (llk1[t] - m).exp();
                if rng.gen::<f64>() * (w0 + w1) < w0 {
                    0u8
                } else {
                    1u8
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_data(ref_counts: Vec<f64>, alt_counts: Vec<f64>) -> SampleData {
        let n = ref_counts.len();
        SampleData::from_parts(
            vec!["chr1".to_string()],
            vec![(0..n as u64).map(|i| 100 * (i + 1)).collect()],
            ref_counts,
            alt_counts,
            vec![0.5; n],
        )
        .unwrap()
    }

    #[test]
    fn test_strain_choice_tracks_proportions() {
        let mut rng = StdRng::seed_from_u64(11);
        let proportions = vec![0.05, 0.95];
        let mut hits = [0usize; 2];
        for _ in 0..2000 {
            hits[sample_strain_by_proportion(&proportions, &mut rng)] += 1;
        }
        assert!(hits[1] > hits[0] * 5);
    }

    #[test]
    fn test_reference_heavy_counts_drive_bits_to_zero() {
        let data = test_data(vec![100.0; 6], vec![0.0; 6]);
        let sampler = SingleHapSampler::new(&data, None, MISS_COPY_PROB);
        let mut rng = StdRng::seed_from_u64(3);

        let haplotypes = vec![vec![1u8]; 6];
        let wsaf = vec![1.0; 6];
        let update = sampler
            .propose(0, &[1.0], &haplotypes, &wsaf, &mut rng)
            .unwrap();

        assert_eq!(update.strain, 0);
        assert_eq!(update.bits, vec![0; 6]);
        for (w, llk) in update.wsaf.iter().zip(update.site_llks.iter()) {
            assert_eq!(*w, 0.0);
            assert!(llk.is_finite());
        }
    }

    #[test]
    fn test_copying_follows_matching_donor() {
        // Panel donor 0 is all-zero, donor 1 all-one; counts favour zero.
        let data = test_data(vec![100.0; 5], vec![0.0; 5]);
        let panel = Panel::from_bits(vec![vec![0, 1]; 5]);
        let sampler = SingleHapSampler::new(&data, Some(&panel), 0.0);
        let mut rng = StdRng::seed_from_u64(5);

        let haplotypes = vec![vec![0u8, 0u8]; 5];
        let wsaf = vec![0.0; 5];
        let update = sampler
            .propose(0, &[0.5, 0.5], &haplotypes, &wsaf, &mut rng)
            .unwrap();

        assert_eq!(update.bits, vec![0; 5]);
    }

    #[test]
    fn test_update_covers_full_segment() {
        let data = test_data(vec![30.0, 40.0, 10.0], vec![10.0, 5.0, 20.0]);
        let panel = Panel::from_bits(vec![vec![0, 1, 1], vec![1, 0, 1], vec![0, 0, 1]]);
        let sampler = SingleHapSampler::new(&data, Some(&panel), MISS_COPY_PROB);
        let mut rng = StdRng::seed_from_u64(17);

        let haplotypes = vec![vec![0u8, 1u8]; 3];
        let wsaf = vec![0.5; 3];
        let update = sampler
            .propose(0, &[0.5, 0.5], &haplotypes, &wsaf, &mut rng)
            .unwrap();

        assert_eq!(update.bits.len(), 3);
        assert_eq!(update.wsaf.len(), 3);
        assert_eq!(update.site_llks.len(), 3);
        assert!(update.bits.iter().all(|&b| b == 0 || b == 1));
        assert!(update.wsaf.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }
}
