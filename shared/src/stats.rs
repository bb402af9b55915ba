//! Summary statistics for residual aggregation.

use num_traits::ToPrimitive;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean<T: ToPrimitive>(values: &[T]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().filter_map(|v| v.to_f64()).sum();
    Some(sum / values.len() as f64)
}

/// Sample standard deviation (Bessel corrected, `n - 1` denominator).
///
/// Returns `None` with fewer than two values.
pub fn sample_std_dev<T: ToPrimitive>(values: &[T]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq: f64 = values
        .iter()
        .filter_map(|v| v.to_f64())
        .map(|v| (v - mean) * (v - mean))
        .sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}
