//! Allocation planner.
//!
//! Splits available cash across the ranked table in proportion to each
//! candidate's share of the total rating, rounding every quantity down to
//! whole shares. Rounding down per symbol means total spend never exceeds
//! the cash it was given; the remainder stays uninvested.

use rust_decimal::prelude::*;
use tracing::{debug, info, warn};

use crate::types::{AllocationPlan, PlannedOrder, RankedTable};

pub struct AllocationPlanner;

impl AllocationPlanner {
    /// `shares = floor(rating / total_rating * cash / price)` per candidate,
    /// in table order. Zero-share symbols are omitted.
    pub fn plan(table: &RankedTable, cash: Decimal) -> AllocationPlan {
        let mut plan = AllocationPlan::default();

        if table.is_empty() || cash <= Decimal::ZERO {
            return plan;
        }

        let ratings: Vec<Option<Decimal>> = table.iter().map(|c| Decimal::from_f64(c.rating)).collect();
        let total_rating: Decimal = ratings.iter().flatten().copied().sum();
        if total_rating <= Decimal::ZERO {
            return plan;
        }

        for (candidate, rating) in table.iter().zip(ratings) {
            let Some(rating) = rating else {
                warn!(symbol = %candidate.symbol, rating = candidate.rating, "Rating not representable, skipping");
                continue;
            };
            if candidate.price <= Decimal::ZERO {
                warn!(symbol = %candidate.symbol, price = %candidate.price, "Non-positive price, skipping");
                continue;
            }

            // One division keeps the rounding error to a single step.
            let shares = rating
                .checked_mul(cash)
                .zip(total_rating.checked_mul(candidate.price))
                .and_then(|(numerator, denominator)| numerator.checked_div(denominator))
                .and_then(|q| q.floor().to_u64());

            match shares {
                Some(0) => debug!(symbol = %candidate.symbol, "Allocation below one share"),
                Some(shares) => plan.push(PlannedOrder {
                    symbol: candidate.symbol.clone(),
                    shares,
                    price: candidate.price,
                }),
                None => warn!(symbol = %candidate.symbol, "Allocation overflowed, skipping"),
            }
        }

        plan
    }

    /// Log each planned order and the total against available cash.
    pub fn log_plan(plan: &AllocationPlan, cash: Decimal) {
        for order in plan.orders() {
            info!(
                symbol = %order.symbol,
                shares = order.shares,
                price = format!("${:.2}", order.price),
                cost = format!("${:.2}", order.cost()),
                "{} shares of {} posed to be bought",
                order.shares,
                order.symbol
            );
        }
        info!(
            orders = plan.len(),
            total = format!("${:.2}", plan.total_cost()),
            cash = format!("${:.2}", cash),
            "${:.2} to be spent from ${:.2}",
            plan.total_cost(),
            cash
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
