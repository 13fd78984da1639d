//! MACD line: fast EMA minus slow EMA of closes.
//!
//! Only the line itself is produced. Lookback: slow - 1.

use super::ema::{ema_of_series, EmaSeed};

/// MACD window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub seed: EmaSeed,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            seed: EmaSeed::SimpleAverage,
        }
    }
}

impl MacdParams {
    /// Leading outputs that are undefined.
    pub fn lookback(&self) -> usize {
        self.slow.saturating_sub(1)
    }
}

/// MACD line aligned with `closes`; `NaN` inside the slow EMA's warm-up.
pub fn macd_line(closes: &[f64], params: MacdParams) -> Vec<f64> {
    let fast = ema_of_series(closes, params.fast, params.seed);
    let slow = ema_of_series(closes, params.slow, params.seed);
    fast.iter().zip(&slow).map(|(f, s)| f - s).collect()
}

/// The defined part of the MACD line (warm-up discarded).
pub fn macd_values(closes: &[f64], params: MacdParams) -> Vec<f64> {
    let line = macd_line(closes, params);
    line.into_iter().skip(params.lookback()).collect()
}
