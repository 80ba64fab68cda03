//! # MCMC Engine
//!
//! Chain control: initialisation from the PLAF prior, the per-iteration
//! rotation of proportion and haplotype updates, burn-in, sample thinning
//! and trace recording. The engine owns the single RNG stream and is the
//! sole mutator of the chain state, so a fixed seed reproduces a run
//! bit-for-bit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::data::SampleData;
use crate::error::{DeconvError, Result};
use crate::model::pair::PairHapSampler;
use crate::model::panel::Panel;
use crate::model::proportions::{expected_wsaf, ProportionSampler, PROPOSAL_SIGMA};
use crate::model::single::{SingleHapSampler, MISS_COPY_PROB};
use crate::model::stats::{site_llks, sum_vec};

/// Chain hyperparameters.
#[derive(Debug, Clone)]
pub struct McmcSettings {
    /// Number of latent strains K
    pub k_strain: usize,
    /// Number of kept samples
    pub n_sample: usize,
    /// Thinning rate between kept samples
    pub rate: usize,
    /// Iterations discarded before thinning begins
    pub burnin: usize,
    /// RNG seed
    pub seed: u64,
    /// Per-locus miss-copying probability
    pub miss_copy_prob: f64,
    /// Standard deviation of the proportion proposal
    pub proposal_sigma: f64,
}

impl McmcSettings {
    pub fn new(k_strain: usize, n_sample: usize, rate: usize, seed: u64) -> Self {
        Self {
            k_strain,
            n_sample,
            rate,
            burnin: Self::default_burnin(n_sample, rate),
            seed,
            miss_copy_prob: MISS_COPY_PROB,
            proposal_sigma: PROPOSAL_SIGMA,
        }
    }

    /// Half of the sampling phase.
    pub fn default_burnin(n_sample: usize, rate: usize) -> usize {
        n_sample * rate / 2
    }

    pub fn total_iterations(&self) -> usize {
        self.burnin + self.n_sample * self.rate
    }
}

/// Append-only record of the chain.
#[derive(Debug, Clone, Default)]
pub struct McmcTrace {
    /// Proportion vector of each kept sample
    pub proportions: Vec<Vec<f64>>,
    /// Total log-likelihood of each kept sample
    pub llk: Vec<f64>,
    /// Haplotype matrix `[locus][strain]` at the final iteration
    pub final_haplotypes: Vec<Vec<u8>>,
    /// HMM passes skipped on numeric underflow
    pub underflow_skips: usize,
    /// Accepted proportion proposals
    pub proportion_acceptances: usize,
}

/// The MCMC chain over one sample's data.
pub struct McmcEngine<'a> {
    data: &'a SampleData,
    panel: Option<&'a Panel>,
    settings: McmcSettings,
    rng: StdRng,
    prop_sampler: ProportionSampler,

    proportions: Vec<f64>,
    /// `haplotypes[locus][strain]`
    haplotypes: Vec<Vec<u8>>,
    wsaf: Vec<f64>,
    site_llks: Vec<f64>,

    trace: McmcTrace,
}

impl<'a> McmcEngine<'a> {
    /// Initialise the chain: uniform proportions, haplotype bits drawn
    /// from the PLAF prior, and the implied WSAF and likelihoods.
    pub fn new(
        data: &'a SampleData,
        panel: Option<&'a Panel>,
        settings: McmcSettings,
    ) -> Result<Self> {
        if settings.k_strain == 0 {
            return Err(DeconvError::config("number of strains must be at least 1"));
        }
        if settings.rate == 0 {
            return Err(DeconvError::config("thinning rate must be at least 1"));
        }
        if let Some(p) = panel {
            if p.n_loci() != data.n_loci() {
                return Err(DeconvError::invalid_input(
                    "panel and sample data disagree on the number of loci",
                ));
            }
            if p.n_panel() == 0 {
                return Err(DeconvError::invalid_input("panel has no haplotypes"));
            }
        }

        let prop_sampler = ProportionSampler::new(settings.proposal_sigma)?;
        let mut rng = StdRng::seed_from_u64(settings.seed);

        let k = settings.k_strain;
        let proportions = vec![1.0 / k as f64; k];
        let haplotypes: Vec<Vec<u8>> = data
            .plaf()
            .iter()
            .map(|&p| (0..k).map(|_| u8::from(rng.gen::<f64>() < p)).collect())
            .collect();
        let wsaf = expected_wsaf(&proportions, &haplotypes);
        let site_llks = site_llks(data.ref_count(), data.alt_count(), &wsaf, 0, data.n_loci());

        Ok(Self {
            data,
            panel,
            settings,
            rng,
            prop_sampler,
            proportions,
            haplotypes,
            wsaf,
            site_llks,
            trace: McmcTrace::default(),
        })
    }

    /// Run the chain to completion and return the trace.
    pub fn run(mut self) -> Result<McmcTrace> {
        let total = self.settings.total_iterations();
        let span = tracing::info_span!("mcmc", iterations = total);
        let _guard = span.enter();

        info!(
            k = self.settings.k_strain,
            n_sample = self.settings.n_sample,
            rate = self.settings.rate,
            burnin = self.settings.burnin,
            seed = self.settings.seed,
            "starting chain"
        );

        for t in 0..total {
            match t % 3 {
                0 => self.update_proportions(),
                1 => self.update_single_haps()?,
                _ => {
                    if self.settings.k_strain >= 2 {
                        self.update_pair_haps()?;
                    } else {
                        self.update_single_haps()?;
                    }
                }
            }

            if t >= self.settings.burnin && (t - self.settings.burnin) % self.settings.rate == 0 {
                self.trace.proportions.push(self.proportions.clone());
                self.trace.llk.push(sum_vec(&self.site_llks));
            }
        }

        debug!(
            acceptances = self.trace.proportion_acceptances,
            underflows = self.trace.underflow_skips,
            "chain finished"
        );

        self.trace.final_haplotypes = self.haplotypes;
        Ok(self.trace)
    }

    fn update_proportions(&mut self) {
        if let Some(update) = self.prop_sampler.update(
            self.data,
            &self.haplotypes,
            &self.proportions,
            &self.site_llks,
            &mut self.rng,
        ) {
            self.proportions = update.proportions;
            self.wsaf = update.wsaf;
            self.site_llks = update.site_llks;
            self.trace.proportion_acceptances += 1;
        }
    }

    fn update_single_haps(&mut self) -> Result<()> {
        let sampler =
            SingleHapSampler::new(self.data, self.panel, self.settings.miss_copy_prob);
        for segment in 0..self.data.n_segments() {
            match sampler.propose(
                segment,
                &self.proportions,
                &self.haplotypes,
                &self.wsaf,
                &mut self.rng,
            ) {
                Ok(update) => {
                    for (t, &bit) in update.bits.iter().enumerate() {
                        let i = update.segment_start + t;
                        self.haplotypes[i][update.strain] = bit;
                        self.wsaf[i] = update.wsaf[t];
                        self.site_llks[i] = update.site_llks[t];
                    }
                }
                Err(DeconvError::NumericUnderflow { locus }) => {
                    debug!(locus, segment, "single-strain pass skipped on underflow");
                    self.trace.underflow_skips += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn update_pair_haps(&mut self) -> Result<()> {
        let sampler = PairHapSampler::new(self.data, self.panel, self.settings.miss_copy_prob);
        for segment in 0..self.data.n_segments() {
            match sampler.propose(
                segment,
                &self.proportions,
                &self.haplotypes,
                &self.wsaf,
                &mut self.rng,
            ) {
                Ok(update) => {
                    for t in 0..update.bits1.len() {
                        let i = update.segment_start + t;
                        self.haplotypes[i][update.strain1] = update.bits1[t];
                        self.haplotypes[i][update.strain2] = update.bits2[t];
                        self.wsaf[i] = update.wsaf[t];
                        self.site_llks[i] = update.site_llks[t];
                    }
                }
                Err(DeconvError::NumericUnderflow { locus }) => {
                    debug!(locus, segment, "pair-strain pass skipped on underflow");
                    self.trace.underflow_skips += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_data(ref_counts: Vec<f64>, alt_counts: Vec<f64>, plaf: f64) -> SampleData {
        let n = ref_counts.len();
        SampleData::from_parts(
            vec!["chr1".to_string()],
            vec![(0..n as u64).map(|i| 500 * (i + 1)).collect()],
            ref_counts,
            alt_counts,
            vec![plaf; n],
        )
        .unwrap()
    }

    #[test]
    fn test_settings_iteration_counts() {
        let s = McmcSettings::new(3, 100, 5, 1);
        assert_eq!(s.burnin, 250);
        assert_eq!(s.total_iterations(), 750);
    }

    #[test]
    fn test_trace_has_exactly_n_sample_entries() {
        let data = test_data(vec![20.0; 5], vec![10.0; 5], 0.3);
        let settings = McmcSettings::new(2, 20, 3, 7);
        let trace = McmcEngine::new(&data, None, settings).unwrap().run().unwrap();
        assert_eq!(trace.proportions.len(), 20);
        assert_eq!(trace.llk.len(), 20);
        assert_eq!(trace.final_haplotypes.len(), 5);
        assert_eq!(trace.final_haplotypes[0].len(), 2);
    }

    #[test]
    fn test_kept_samples_satisfy_invariants() {
        let data = test_data(vec![50.0; 8], vec![25.0; 8], 0.4);
        let settings = McmcSettings::new(3, 30, 2, 19);
        let trace = McmcEngine::new(&data, None, settings).unwrap().run().unwrap();

        for row in &trace.proportions {
            assert!((sum_vec(row) - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
        assert!(trace
            .final_haplotypes
            .iter()
            .flatten()
            .all(|&b| b == 0 || b == 1));
        assert!(trace.llk.iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_fixed_seed_reproduces_trace() {
        let data = test_data(vec![40.0; 6], vec![20.0; 6], 0.5);
        let panel = Panel::from_bits(vec![vec![0, 1]; 6]);

        let run = |seed| {
            let settings = McmcSettings::new(2, 15, 2, seed);
            McmcEngine::new(&data, Some(&panel), settings)
                .unwrap()
                .run()
                .unwrap()
        };
        let a = run(42);
        let b = run(42);
        assert_eq!(a.proportions, b.proportions);
        assert_eq!(a.llk, b.llk);
        assert_eq!(a.final_haplotypes, b.final_haplotypes);

        let c = run(43);
        assert!(a.llk != c.llk || a.final_haplotypes != c.final_haplotypes);
    }

    #[test]
    fn test_single_locus_genome_runs() {
        let data = test_data(vec![30.0], vec![30.0], 0.5);
        let settings = McmcSettings::new(2, 5, 2, 3);
        let trace = McmcEngine::new(&data, None, settings).unwrap().run().unwrap();
        assert_eq!(trace.final_haplotypes.len(), 1);
    }

    #[test]
    fn test_k1_pure_reference_sample() {
        // Every read supports the reference allele, so the single strain
        // must settle on the all-zero haplotype.
        let data = test_data(vec![100.0; 10], vec![0.0; 10], 0.5);
        let settings = McmcSettings::new(1, 50, 2, 13);
        let trace = McmcEngine::new(&data, None, settings).unwrap().run().unwrap();

        assert_eq!(trace.proportions[0], vec![1.0]);
        assert!(trace.final_haplotypes.iter().all(|row| row[0] == 0));
    }

    #[test]
    fn test_k2_mixture_recovery_with_panel() {
        // Two known haplotypes mixed at 0.3 / 0.7, both in the panel.
        // Strain A carries the alternative allele at odd loci, strain B at
        // even loci, so the true WSAF alternates between 0.3 and 0.7.
        let n = 40;
        let hap_a: Vec<u8> = (0..n).map(|i| (i % 2) as u8).collect();
        let hap_b: Vec<u8> = (0..n).map(|i| 1 - (i % 2) as u8).collect();
        let depth = 100.0;

        let mut ref_counts = Vec::with_capacity(n);
        let mut alt_counts = Vec::with_capacity(n);
        for i in 0..n {
            let w = 0.3 * hap_a[i] as f64 + 0.7 * hap_b[i] as f64;
            alt_counts.push((depth * w).round());
            ref_counts.push(depth - (depth * w).round());
        }
        let data = test_data(ref_counts, alt_counts, 0.5);
        let panel = Panel::from_bits((0..n).map(|i| vec![hap_a[i], hap_b[i]]).collect());

        let settings = McmcSettings::new(2, 300, 2, 42);
        let trace = McmcEngine::new(&data, Some(&panel), settings)
            .unwrap()
            .run()
            .unwrap();

        let k = 2;
        let mut mean = vec![0.0; k];
        for row in &trace.proportions {
            for (m, p) in mean.iter_mut().zip(row.iter()) {
                *m += p;
            }
        }
        for m in mean.iter_mut() {
            *m /= trace.proportions.len() as f64;
        }
        mean.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!(
            (mean[0] - 0.3).abs() < 0.12 && (mean[1] - 0.7).abs() < 0.12,
            "posterior mean proportions {:?} far from truth [0.3, 0.7]",
            mean
        );

        // Final haplotypes should match the truth up to strain labels.
        let hamming = |truth: &[Vec<u8>]| -> usize {
            trace
                .final_haplotypes
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    (row[0] != truth[i][0]) as usize + (row[1] != truth[i][1]) as usize
                })
                .sum()
        };
        let direct: Vec<Vec<u8>> = (0..n).map(|i| vec![hap_a[i], hap_b[i]]).collect();
        let swapped: Vec<Vec<u8>> = (0..n).map(|i| vec![hap_b[i], hap_a[i]]).collect();
        let best = hamming(&direct).min(hamming(&swapped));
        assert!(
            best <= n / 5,
            "final haplotypes differ from truth at {} of {} bits",
            best,
            2 * n
        );
    }

    #[test]
    fn test_k1_pure_alternative_sample() {
        let data = test_data(vec![0.0; 10], vec![100.0; 10], 0.5);
        let settings = McmcSettings::new(1, 50, 2, 13);
        let trace = McmcEngine::new(&data, None, settings).unwrap().run().unwrap();
        assert!(trace.final_haplotypes.iter().all(|row| row[0] == 1));
    }
}
