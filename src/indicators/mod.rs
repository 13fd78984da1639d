//! Technical indicators over close-price slices.
//!
//! Outputs are aligned with their input: index `i` of the result belongs
//! to bar `i`, and positions inside an indicator's warm-up are `NaN`.

pub mod ema;
pub mod macd;

/// Sample standard deviation (denominator `n - 1`).
///
/// Returns `None` for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (n - 1.0)).sqrt())
}
