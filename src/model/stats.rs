//! # Numerical Utilities
//!
//! Vector sums, in-place normalisation, CDF construction and inverse-CDF
//! sampling, the log-Beta function, and the Beta-Binomial read-count
//! log-likelihood used throughout the sampler.

use statrs::function::gamma::ln_gamma;

use crate::error::{DeconvError, Result};

/// Sequencing error rate folded into the expected allele frequency
pub const READ_ERROR_RATE: f64 = 0.01;

/// Beta-Binomial overdispersion parameter
pub const OVERDISPERSION: f64 = 100.0;

/// Sum of a vector
pub fn sum_vec(v: &[f64]) -> f64 {
    v.iter().sum()
}

/// Sum of all entries of a matrix
pub fn sum_mat(m: &[Vec<f64>]) -> f64 {
    m.iter().map(|row| sum_vec(row)).sum()
}

/// Divide a vector in place by its sum.
///
/// The sum must be strictly positive.
pub fn normalise(v: &mut [f64]) -> Result<()> {
    let total = sum_vec(v);
    if total <= 0.0 {
        return Err(DeconvError::invalid_input(
            "cannot normalise a vector with non-positive sum",
        ));
    }
    for x in v.iter_mut() {
        *x /= total;
    }
    Ok(())
}

/// Divide a matrix in place by the sum of all its entries.
pub fn normalise_mat(m: &mut [Vec<f64>]) -> Result<()> {
    let total = sum_mat(m);
    if total <= 0.0 {
        return Err(DeconvError::invalid_input(
            "cannot normalise a matrix with non-positive sum",
        ));
    }
    for row in m.iter_mut() {
        for x in row.iter_mut() {
            *x /= total;
        }
    }
    Ok(())
}

/// Prefix sums of a distribution.
///
/// The last entry equals the sum of the input; the input need not be
/// normalised.
pub fn cdf(dist: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(dist.len());
    let mut cumsum = 0.0;
    for &p in dist {
        cumsum += p;
        out.push(cumsum);
    }
    out
}

/// Lowest index `i` with `cdf[i] >= u`, for `u` uniform in `[0, cdf.last())`.
pub fn sample_index_by_cdf(cdf: &[f64], u: f64) -> usize {
    for (i, &c) in cdf.iter().enumerate() {
        if c >= u {
            return i;
        }
    }
    cdf.len() - 1
}

/// `ln B(x, y) = ln Γ(x) + ln Γ(y) - ln Γ(x + y)`
pub fn log_beta(x: f64, y: f64) -> f64 {
    ln_gamma(x) + ln_gamma(y) - ln_gamma(x + y)
}

/// Beta-Binomial log-likelihood of observing `ref_count` reference and
/// `alt_count` alternative reads given an expected within-sample
/// alternative-allele frequency `wsaf`.
///
/// The frequency is first shrunk toward 0.5 by the read error rate,
/// `w' = w + err (1 - 2w)`, so the likelihood stays finite at w = 0 and
/// w = 1.
pub fn beta_binom_llk(ref_count: f64, alt_count: f64, wsaf: f64, err: f64, fac: f64) -> f64 {
    let adjusted = wsaf + err * (1.0 - 2.0 * wsaf);
    log_beta(alt_count + adjusted * fac, ref_count + (1.0 - adjusted) * fac)
        - log_beta(adjusted * fac, (1.0 - adjusted) * fac)
}

/// `beta_binom_llk` with the default error and overdispersion constants.
pub fn site_llk(ref_count: f64, alt_count: f64, wsaf: f64) -> f64 {
    beta_binom_llk(ref_count, alt_count, wsaf, READ_ERROR_RATE, OVERDISPERSION)
}

/// Per-locus log-likelihoods over `[first, first + len)` given the current
/// expected WSAF vector.
pub fn site_llks(
    ref_count: &[f64],
    alt_count: &[f64],
    wsaf: &[f64],
    first: usize,
    len: usize,
) -> Vec<f64> {
    (first..first + len)
        .map(|i| site_llk(ref_count[i], alt_count[i], wsaf[i]))
        .collect()
}
