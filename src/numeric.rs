//! Numeric primitives shared by the legislative formulas: guarded division, ranking, per-stratum
//! means, apportionment of an envelope and the year-on-year growth clamp.
use crate::error::EvaluationError;
use itertools::izip;
use log::warn;
use std::cmp::Ordering;

/// Divide `a` by `b` element-wise, using `fallback` wherever `b` is zero
pub fn safe_divide(a: &[f64], b: &[f64], fallback: f64) -> Vec<f64> {
    izip!(a, b)
        .map(|(&a, &b)| safe_divide_scalar(a, b, fallback))
        .collect()
}

/// Divide two numbers, using `fallback` if the denominator is zero
pub fn safe_divide_scalar(a: f64, b: f64, fallback: f64) -> f64 {
    if b == 0.0 { fallback } else { a / b }
}

/// Divide two numbers where a zero denominator means the data is unusable.
///
/// # Arguments
///
/// * `numerator` - The dividend
/// * `denominator` - The divisor
/// * `context` - What is being computed, for the error message
pub fn divide_scalar(
    numerator: f64,
    denominator: f64,
    context: &str,
) -> Result<f64, EvaluationError> {
    if denominator == 0.0 {
        return Err(EvaluationError::DivisionByZeroPolicyViolation {
            context: context.to_string(),
        });
    }

    Ok(numerator / denominator)
}

/// Sum of `numerator` over `denominator` for the members selected by `mask`, or `fallback` if the
/// selected denominator sums to zero
pub fn masked_ratio(mask: &[f64], numerator: &[f64], denominator: &[f64], fallback: f64) -> f64 {
    let (num, den) = izip!(mask, numerator, denominator)
        .filter(|(m, _, _)| **m != 0.0)
        .fold((0.0, 0.0), |(num, den), (_, n, d)| (num + n, den + d));

    safe_divide_scalar(num, den, fallback)
}

/// Rank values in descending order, starting from 1.
///
/// Every position gets a distinct rank. Equal values are ranked in the order in which they appear
/// and NaN ranks after every number.
pub fn stable_descending_rank(values: &[f64]) -> Vec<f64> {
    let key = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v + 0.0 };

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| match key(values[j]).total_cmp(&key(values[i])) {
        // NaN and -inf share a key, so fall back on NaN-ness before position
        Ordering::Equal => values[i].is_nan().cmp(&values[j].is_nan()),
        other => other,
    });

    let mut ranks = vec![0.0; values.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = (rank + 1) as f64;
    }

    ranks
}

/// Per-stratum ratio of sums, given back to each member of the stratum.
///
/// For each stratum, the mean is the sum of `numerator` over the sum of `denominator` for the
/// members which are not excluded, or zero where that denominator is zero. Excluded members get
/// zero.
///
/// # Arguments
///
/// * `strata` - The stratum of each member (non-negative whole numbers)
/// * `numerator` - e.g. total revenue
/// * `denominator` - e.g. population
/// * `excluded` - Non-zero for members left out of the means (e.g. overseas communes)
pub fn group_mean_by_stratum(
    strata: &[f64],
    numerator: &[f64],
    denominator: &[f64],
    excluded: &[f64],
) -> Vec<f64> {
    let n_strata = strata.iter().fold(0usize, |max, &s| max.max(s as usize)) + 1;
    let mut sums = vec![(0.0, 0.0); n_strata];
    for (&stratum, &num, &den, &excluded) in izip!(strata, numerator, denominator, excluded) {
        if excluded == 0.0 {
            let (n, d) = &mut sums[stratum as usize];
            *n += num;
            *d += den;
        }
    }

    let means: Vec<_> = sums
        .into_iter()
        .map(|(num, den)| safe_divide_scalar(num, den, 0.0))
        .collect();

    izip!(strata, excluded)
        .map(|(&stratum, &excluded)| {
            if excluded == 0.0 {
                means[stratum as usize]
            } else {
                0.0
            }
        })
        .collect()
}

/// Share an envelope between members in proportion to their scores.
///
/// Returns the value of one point (`envelope / sum(scores)`) and each member's share. If the
/// scores sum to zero, the point is worth nothing and no one receives anything.
pub fn value_per_point(envelope: f64, scores: &[f64]) -> (f64, Vec<f64>) {
    let total: f64 = scores.iter().sum();
    if total == 0.0 {
        warn!("Scores sum to zero; envelope of {envelope} is not apportioned");
        return (0.0, vec![0.0; scores.len()]);
    }

    let point = envelope / total;
    (point, scores.iter().map(|s| s * point).collect())
}

/// Keep this year's amount within `[floor * previous, cap * previous]`.
///
/// The clamp only applies where both amounts are positive; otherwise the current amount is kept.
pub fn growth_clamp(previous: &[f64], current: &[f64], floor: f64, cap: f64) -> Vec<f64> {
    izip!(previous, current)
        .map(|(&previous, &current)| {
            if previous > 0.0 && current > 0.0 {
                current.min(cap * previous).max(floor * previous)
            } else {
                current
            }
        })
        .collect()
}
