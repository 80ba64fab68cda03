//! # Generic Copying-HMM Pass
//!
//! One forward recursion plus posterior back-sampling, shared by the
//! single-strain and pair-strain haplotype updaters. The two updaters
//! plug in their own emission and transition structure through
//! [`CopyingSpace`]; the pass itself only sees a flat state vector.
//!
//! Forward rows are normalised after every locus so the recursion stays
//! in a safe floating range; a row whose mass vanishes aborts the pass
//! with a `NumericUnderflow` and nothing is committed.

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{DeconvError, Result};
use crate::model::stats::{cdf, sample_index_by_cdf, sum_vec};

/// State space of one copying HMM pass over a segment.
///
/// Offsets `t` are relative to the segment start; implementations hold
/// whatever per-locus context they need (panel bits, emission tables,
/// recombination weights).
pub trait CopyingSpace {
    /// Number of HMM states
    fn n_states(&self) -> usize;

    /// Number of loci in the segment
    fn n_loci(&self) -> usize;

    /// Emission weight of `state` at offset `t`. May be scaled by any
    /// per-locus constant; the pass renormalises each row.
    fn emission(&self, t: usize, state: usize) -> f64;

    /// Fill `out` with the transition mass flowing into each state at
    /// offset `t` from the previous (normalised) forward row.
    fn fold_transitions(&self, t: usize, prev: &[f64], out: &mut [f64]);

    /// Unnormalised weight of `state` at offset `t_next - 1` given the
    /// state already chosen at offset `t_next`.
    fn backsample_weight(&self, t_next: usize, state: usize, next: usize) -> f64;
}

/// Forward matrix of a completed pass, row-stochastic per locus.
#[derive(Debug, Clone)]
pub struct ForwardProbs {
    pub rows: Vec<Vec<f64>>,
}

/// Run the forward recursion over a segment.
///
/// `segment_start` is only used to name the offending flattened locus in
/// underflow errors.
pub fn forward<S: CopyingSpace>(space: &S, segment_start: usize) -> Result<ForwardProbs> {
    let n_states = space.n_states();
    let n_loci = space.n_loci();
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(n_loci);
    let mut mix = vec![0.0; n_states];

    for t in 0..n_loci {
        let mut row = vec![0.0; n_states];
        if t == 0 {
            let prior = 1.0 / n_states as f64;
            for s in 0..n_states {
                row[s] = space.emission(0, s) * prior;
            }
        } else {
            space.fold_transitions(t, &rows[t - 1], &mut mix);
            for s in 0..n_states {
                row[s] = space.emission(t, s) * mix[s];
            }
        }

        let total = sum_vec(&row);
        if total <= f64::MIN_POSITIVE {
            return Err(DeconvError::NumericUnderflow {
                locus: segment_start + t,
            });
        }
        for x in row.iter_mut() {
            *x /= total;
        }
        rows.push(row);
    }

    Ok(ForwardProbs { rows })
}

/// Sample a copying path from the posterior implied by the forward
/// matrix, walking from the last locus back to the first.
pub fn sample_path<S: CopyingSpace>(
    space: &S,
    fwd: &ForwardProbs,
    segment_start: usize,
    rng: &mut StdRng,
) -> Result<Vec<usize>> {
    let n_loci = fwd.rows.len();
    let n_states = space.n_states();
    let mut path = vec![0usize; n_loci];

    let last_cdf = cdf(&fwd.rows[n_loci - 1]);
    let u = rng.gen::<f64>() * last_cdf[last_cdf.len() - 1];
    path[n_loci - 1] = sample_index_by_cdf(&last_cdf, u);

    let mut weights = vec![0.0; n_states];
    for t in (0..n_loci - 1).rev() {
        let next = path[t + 1];
        for s in 0..n_states {
            weights[s] = fwd.rows[t][s] * space.backsample_weight(t + 1, s, next);
        }
        let w_cdf = cdf(&weights);
        let total = w_cdf[w_cdf.len() - 1];
        if total <= f64::MIN_POSITIVE {
            return Err(DeconvError::NumericUnderflow {
                locus: segment_start + t,
            });
        }
        let u = rng.gen::<f64>() * total;
        path[t] = sample_index_by_cdf(&w_cdf, u);
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Two-state space with a hard preference for state 0 everywhere.
    struct TwoState {
        n_loci: usize,
        rho: f64,
    }

    impl CopyingSpace for TwoState {
        fn n_states(&self) -> usize {
            2
        }

        fn n_loci(&self) -> usize {
            self.n_loci
        }

        fn emission(&self, _t: usize, state: usize) -> f64 {
            if state == 0 {
                0.999
            } else {
                0.001
            }
        }

        fn fold_transitions(&self, _t: usize, prev: &[f64], out: &mut [f64]) {
            let total = sum_vec(prev);
            for (s, o) in out.iter_mut().enumerate() {
                *o = (1.0 - self.rho) * prev[s] + self.rho / 2.0 * total;
            }
        }

        fn backsample_weight(&self, _t_next: usize, state: usize, next: usize) -> f64 {
            let stay = if state == next { 1.0 - self.rho } else { 0.0 };
            stay + self.rho / 2.0
        }
    }

    #[test]
    fn test_forward_rows_are_stochastic() {
        let space = TwoState { n_loci: 8, rho: 0.05 };
        let fwd = forward(&space, 0).unwrap();
        assert_eq!(fwd.rows.len(), 8);
        for row in &fwd.rows {
            assert!((sum_vec(row) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sampled_path_follows_emissions() {
        let space = TwoState { n_loci: 20, rho: 0.05 };
        let fwd = forward(&space, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let path = sample_path(&space, &fwd, 0, &mut rng).unwrap();
        let zeros = path.iter().filter(|&&s| s == 0).count();
        assert!(zeros >= 16, "path {:?} ignored the emissions", path);
    }

    #[test]
    fn test_single_locus_segment() {
        let space = TwoState { n_loci: 1, rho: 0.05 };
        let fwd = forward(&space, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let path = sample_path(&space, &fwd, 3, &mut rng).unwrap();
        assert_eq!(path.len(), 1);
    }

    /// Space whose emissions all vanish after the first locus.
    struct Vanishing;

    impl CopyingSpace for Vanishing {
        fn n_states(&self) -> usize {
            2
        }

        fn n_loci(&self) -> usize {
            3
        }

        fn emission(&self, t: usize, _state: usize) -> f64 {
            if t < 1 {
                1.0
            } else {
                0.0
            }
        }

        fn fold_transitions(&self, _t: usize, prev: &[f64], out: &mut [f64]) {
            out.copy_from_slice(prev);
        }

        fn backsample_weight(&self, _t_next: usize, state: usize, next: usize) -> f64 {
            if state == next {
                1.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn test_underflow_reports_flattened_locus() {
        match forward(&Vanishing, 10) {
            Err(DeconvError::NumericUnderflow { locus }) => assert_eq!(locus, 11),
            other => panic!("expected underflow, got {:?}", other.map(|_| ())),
        }
    }
}
