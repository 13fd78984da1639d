//! Momentum scorer.
//!
//! Rates one symbol's bar window: a low-priced stock that dropped sharply
//! on the latest bar while its MACD line has risen steadily over the last
//! five points. The rating grows with the latest MACD step (relative to the
//! spread of those five points) and with the size of the drop.

use rust_decimal::prelude::*;

use crate::config::ScreenerConfig;
use crate::indicators::macd::{macd_values, MacdParams};
use crate::indicators::sample_std_dev;
use crate::types::{Bar, Candidate};

/// MACD points inspected for the uptrend.
pub const TREND_POINTS: usize = 5;

/// Bars needed for `TREND_POINTS` defined MACD values with the given slow
/// window.
pub fn required_bars(macd_slow: usize) -> usize {
    macd_slow.saturating_sub(1) + TREND_POINTS
}

/// Why a symbol produced no candidate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("expected {expected} bars, got {actual}")]
    InsufficientHistory { expected: usize, actual: usize },

    #[error("non-positive or non-finite close in window")]
    InvalidPrice,

    #[error("latest price {price:.4} outside [{min}, {max}]")]
    PriceOutOfRange { price: f64, min: f64, max: f64 },

    #[error("day change {change:.4} above threshold {threshold}")]
    NotDropping { change: f64, threshold: f64 },

    #[error("MACD not rising across the trend window")]
    NoUptrend,

    #[error("MACD flat across the trend window")]
    FlatMacd,

    #[error("rating {rating} is not positive")]
    NonPositiveRating { rating: f64 },
}

pub struct MomentumScorer {
    config: ScreenerConfig,
}

impl MomentumScorer {
    pub fn new(config: ScreenerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    fn macd_params(&self) -> MacdParams {
        MacdParams {
            fast: self.config.macd_fast,
            slow: self.config.macd_slow,
            seed: self.config.ema_seed,
        }
    }

    /// Score a full bar window. Only windows of exactly `time_window` bars
    /// are scored.
    pub fn score(&self, symbol: &str, bars: &[Bar]) -> Result<Candidate, Rejection> {
        let window = self.config.time_window;
        if bars.len() != window || window < required_bars(self.config.macd_slow) {
            return Err(Rejection::InsufficientHistory {
                expected: window,
                actual: bars.len(),
            });
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        if closes.iter().any(|c| !c.is_finite() || *c <= 0.0) {
            return Err(Rejection::InvalidPrice);
        }

        // Price gate
        let latest_price = closes[closes.len() - 1];
        let day_change = latest_price / closes[closes.len() - 2] - 1.0;

        if latest_price < self.config.min_stock_price || latest_price > self.config.max_stock_price {
            return Err(Rejection::PriceOutOfRange {
                price: latest_price,
                min: self.config.min_stock_price,
                max: self.config.max_stock_price,
            });
        }
        if day_change > self.config.day_change_threshold {
            return Err(Rejection::NotDropping {
                change: day_change,
                threshold: self.config.day_change_threshold,
            });
        }

        // Trend: v[-1] >= v[-2] >= ... >= v[-5] > 0
        let values = macd_values(&closes, self.macd_params());
        let v = &values[values.len() - TREND_POINTS..];
        let trend_up = v[0] > 0.0 && v.windows(2).all(|w| w[1] >= w[0]);
        if !trend_up {
            return Err(Rejection::NoUptrend);
        }

        let macd_change = v[TREND_POINTS - 1] - v[TREND_POINTS - 2];
        let macd_stdev = sample_std_dev(v).unwrap_or(0.0);
        if macd_stdev == 0.0 || !macd_stdev.is_finite() {
            return Err(Rejection::FlatMacd);
        }

        let rating = (macd_change / macd_stdev) * (1.0 - day_change);
        if !(rating.is_finite() && rating > 0.0) {
            return Err(Rejection::NonPositiveRating { rating });
        }

        let price = Decimal::from_f64(latest_price).ok_or(Rejection::InvalidPrice)?;

        Ok(Candidate {
            symbol: symbol.to_string(),
            rating,
            price,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
