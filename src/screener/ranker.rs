//! Candidate ranker.
//!
//! Screens the tradable universe in bar-request batches, scores every
//! symbol with a full bar window, and keeps the best-rated few.

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use super::scorer::{MomentumScorer, Rejection};
use crate::broker::MarketData;
use crate::config::ScreenerConfig;
use crate::types::{Asset, BrokerError, RankedTable};

pub struct CandidateRanker {
    scorer: MomentumScorer,
}

impl CandidateRanker {
    pub fn new(config: ScreenerConfig) -> Self {
        Self {
            scorer: MomentumScorer::new(config),
        }
    }

    /// Rank the tradable subset of `assets`.
    ///
    /// Batches are fetched with up to `fetch_concurrency` requests in flight
    /// but consumed in submission order, so tie-breaking by fetch order is
    /// the same as a sequential run. A failed batch fetch aborts the pass.
    pub async fn rank(
        &self,
        assets: &[Asset],
        market_data: &dyn MarketData,
    ) -> Result<RankedTable, BrokerError> {
        let config = self.scorer.config();
        let window = config.time_window;

        let symbols: Vec<String> = assets
            .iter()
            .filter(|a| a.tradable)
            .map(|a| a.symbol.clone())
            .collect();

        info!(
            universe = symbols.len(),
            batch_size = config.max_batch_size,
            "Filtering assets and calculating ratings"
        );

        let mut batches = stream::iter(symbols.chunks(config.max_batch_size.max(1)))
            .map(|batch| async move { (batch, market_data.fetch_recent_bars(batch, window).await) })
            .buffered(config.fetch_concurrency.max(1));

        let mut candidates = Vec::new();
        let mut short_history = 0usize;
        let mut batch_index = 0usize;

        while let Some((batch, fetched)) = batches.next().await {
            let bars = fetched?;
            batch_index += 1;
            let before = candidates.len();

            for symbol in batch {
                let Some(series) = bars.get(symbol) else {
                    short_history += 1;
                    continue;
                };
                match self.scorer.score(symbol, series) {
                    Ok(candidate) => candidates.push(candidate),
                    Err(Rejection::InsufficientHistory { .. }) => short_history += 1,
                    Err(reason) => debug!(symbol = %symbol, %reason, "Screened out"),
                }
            }

            debug!(
                batch = batch_index,
                symbols = batch.len(),
                returned = bars.len(),
                candidates = candidates.len() - before,
                "Batch screened"
            );
        }

        let found = candidates.len();
        let table = RankedTable::from_candidates(candidates, config.top_n);

        info!(
            found,
            kept = table.len(),
            skipped_short_history = short_history,
            "Found {} stocks, with total rating: {:.4}",
            table.len(),
            table.total_rating()
        );
        for (rank, candidate) in table.iter().enumerate() {
            info!(rank = rank + 1, "{candidate}");
        }

        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
