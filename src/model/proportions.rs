//! # Mixture Proportion Updater
//!
//! Metropolis update of the strain proportions via a random walk on the
//! Dirichlet logit scale: the first coordinate is pinned and the rest are
//! perturbed with Gaussian noise, keeping the simplex constraint exact.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::data::SampleData;
use crate::error::{DeconvError, Result};
use crate::model::stats::{site_llks, sum_vec};

/// Default standard deviation of the logit-scale proposal.
pub const PROPOSAL_SIGMA: f64 = 0.2;

/// Accepted replacement state for the mixture proportions.
#[derive(Debug, Clone)]
pub struct ProportionUpdate {
    pub proportions: Vec<f64>,
    pub wsaf: Vec<f64>,
    pub site_llks: Vec<f64>,
}

/// Dirichlet-logit Metropolis sampler for the proportion vector.
pub struct ProportionSampler {
    step: Normal<f64>,
}

impl ProportionSampler {
    pub fn new(sigma: f64) -> Result<Self> {
        let step = Normal::new(0.0, sigma)
            .map_err(|e| DeconvError::config(format!("bad proposal sigma: {}", e)))?;
        Ok(Self { step })
    }

    /// Propose new proportions and accept or reject by the Metropolis
    /// rule. Returns the replacement state on acceptance, `None` on
    /// rejection or when there is a single strain.
    pub fn update(
        &self,
        data: &SampleData,
        haplotypes: &[Vec<u8>],
        proportions: &[f64],
        current_site_llks: &[f64],
        rng: &mut StdRng,
    ) -> Option<ProportionUpdate> {
        let k = proportions.len();
        if k < 2 {
            return None;
        }

        // delta_0 pinned at zero; the proposal is symmetric in the deltas
        // but carries a Jacobian on the simplex.
        let mut proposed: Vec<f64> = proportions
            .iter()
            .enumerate()
            .map(|(j, &p)| {
                let delta = if j == 0 { 0.0 } else { self.step.sample(rng) };
                p * delta.exp()
            })
            .collect();
        let total = sum_vec(&proposed);
        for p in proposed.iter_mut() {
            *p /= total;
        }

        let wsaf = expected_wsaf(&proposed, haplotypes);
        let new_llks = site_llks(data.ref_count(), data.alt_count(), &wsaf, 0, data.n_loci());

        let delta_llk = sum_vec(&new_llks) - sum_vec(current_site_llks);
        let jacobian: f64 = proposed
            .iter()
            .zip(proportions.iter())
            .map(|(new, old)| (new / old).ln())
            .sum();

        if rng.gen::<f64>().ln() < delta_llk + jacobian {
            Some(ProportionUpdate {
                proportions: proposed,
                wsaf,
                site_llks: new_llks,
            })
        } else {
            None
        }
    }
}

/// `w_i = sum_k pi_k h[i][k]`
pub fn expected_wsaf(proportions: &[f64], haplotypes: &[Vec<u8>]) -> Vec<f64> {
    haplotypes
        .iter()
        .map(|row| {
            row.iter()
                .zip(proportions.iter())
                .map(|(&h, &p)| p * h as f64)
                .sum()
        })
        .collect()
}
