//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (span + 1).
//! Lookback: span - 1. Values before index `span - 1` are `NaN` under
//! either seeding convention.

use serde::{Deserialize, Serialize};

/// How the recursion is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmaSeed {
    /// EMA[span-1] = SMA of the first `span` values (TA-Lib convention).
    #[default]
    SimpleAverage,
    /// EMA[0] = x[0], recursion from the first bar, warm-up masked.
    /// Matches pandas `ewm(span, adjust=False, min_periods=span)`.
    FirstValue,
}

/// Compute an EMA over `values`.
///
/// Any `NaN` input poisons every output from that point on.
pub fn ema_of_series(values: &[f64], span: usize, seed: EmaSeed) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if span == 0 || n < span {
        return result;
    }

    let alpha = 2.0 / (span as f64 + 1.0);

    let (start, mut prev) = match seed {
        EmaSeed::SimpleAverage => {
            let seed_value = values[..span].iter().sum::<f64>() / span as f64;
            (span, seed_value)
        }
        EmaSeed::FirstValue => {
            let mut prev = values[0];
            for &x in &values[1..span] {
                prev = alpha * x + (1.0 - alpha) * prev;
            }
            (span, prev)
        }
    };
    result[span - 1] = prev;

    for i in start..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }

    result
}
