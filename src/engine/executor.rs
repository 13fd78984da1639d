//! Order executor.
//!
//! Submits one market, day-valid buy order per planned symbol. A rejected
//! order is logged and recorded; the remaining orders are still sent.

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::broker::TradingApi;
use crate::types::{AllocationPlan, OrderReceipt, OrderRequest};

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// Result of executing an allocation plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub submitted: Vec<OrderReceipt>,
    pub failed: Vec<FailedOrder>,
    /// Estimated cost of submitted orders at their sizing price.
    pub total_committed: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOrder {
    pub symbol: String,
    pub shares: u64,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct OrderExecutor {
    dry_run: bool,
}

impl OrderExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute every order in `plan`, in plan order.
    ///
    /// In dry-run mode, logs but doesn't submit.
    pub async fn execute(&self, trading: &dyn TradingApi, plan: &AllocationPlan) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        if plan.is_empty() {
            return report;
        }

        info!(count = plan.len(), dry_run = self.dry_run, "Submitting orders");

        for planned in plan.orders() {
            let request = OrderRequest::market_buy_day(&planned.symbol, planned.shares);

            if self.dry_run {
                info!(
                    symbol = %planned.symbol,
                    shares = planned.shares,
                    cost = format!("${:.2}", planned.cost()),
                    "[DRY RUN] Would submit market buy"
                );
                report.submitted.push(OrderReceipt::dry_run(&request));
                report.total_committed += planned.cost();
                continue;
            }

            match trading.submit_order(&request).await {
                Ok(receipt) => {
                    info!(
                        symbol = %receipt.symbol,
                        qty = receipt.qty,
                        order_id = %receipt.order_id,
                        status = %receipt.status,
                        "Order accepted"
                    );
                    report.submitted.push(receipt);
                    report.total_committed += planned.cost();
                }
                Err(e) => {
                    warn!(
                        symbol = %planned.symbol,
                        shares = planned.shares,
                        error = %e,
                        "Order submission failed"
                    );
                    report.failed.push(FailedOrder {
                        symbol: planned.symbol.clone(),
                        shares: planned.shares,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            committed = format!("${:.2}", report.total_committed),
            "Order batch complete"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
