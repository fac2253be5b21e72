//! Log-domain weight arithmetic and systematic selection.

use crate::error::{Result, SmcError};
use rand::{Rng, RngCore};

/// Below this log-ratio the smaller term no longer changes an `f64` sum.
const NEGLIGIBLE_LOG_RATIO: f64 = -20.0;

/// `ln(e^a + e^b)` without leaving the log domain.
pub fn log_sum(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if lo == f64::NEG_INFINITY {
        return hi;
    }
    let diff = lo - hi;
    if diff < NEGLIGIBLE_LOG_RATIO {
        return hi;
    }
    hi + diff.exp().ln_1p()
}

/// `ln(Σ e^wᵢ)`, stable against overflow. Empty input or all `-inf` gives
/// `-inf`.
pub fn log_sum_exp(log_weights: &[f64]) -> f64 {
    let max = max_log_weight(log_weights);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + log_weights
        .iter()
        .map(|w| (w - max).exp())
        .sum::<f64>()
        .ln()
}

pub fn max_log_weight(log_weights: &[f64]) -> f64 {
    log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Effective sample size `(Σ w)² / Σ w²` of normalized weights.
pub fn effective_sample_size(log_weights: &[f64]) -> f64 {
    let max = max_log_weight(log_weights);
    if max == f64::NEG_INFINITY {
        return 0.0;
    }
    let (sum, sum_sq) = log_weights.iter().fold((0.0, 0.0), |(s, sq), w| {
        let x = (w - max).exp();
        (s + x, sq + x * x)
    });
    sum * sum / sum_sq
}

/// Systematic resampling over `log_weights`, drawing `n` ancestors.
///
/// One offset `u ∈ [0, S/n)` is drawn and `n` evenly spaced keys walk the
/// cumulative weights with a single monotone pointer. The returned indices
/// are non-decreasing.
pub fn systematic_selection(
    log_weights: &[f64],
    n: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<usize>> {
    let max = max_log_weight(log_weights);
    if max == f64::NEG_INFINITY {
        return Err(SmcError::AllParticlesDead);
    }

    let mut cumulative = Vec::with_capacity(log_weights.len());
    let mut total = 0.0;
    for w in log_weights {
        total += (w - max).exp();
        cumulative.push(total);
    }

    let spacing = total / n as f64;
    let offset = rng.gen::<f64>() * spacing;
    // the final key can round up to the total; never walk onto a dead tail
    let last = log_weights
        .iter()
        .rposition(|w| *w > f64::NEG_INFINITY)
        .unwrap_or(0);
    let mut selected = Vec::with_capacity(n);
    let mut pointer = 0;
    for k in 0..n {
        let key = offset + k as f64 * spacing;
        while pointer < last && cumulative[pointer] <= key {
            pointer += 1;
        }
        selected.push(pointer);
    }
    Ok(selected)
}
