//! Trading loop.
//!
//! Polls the market clock on a fixed interval. When the market is open,
//! the close is within the buy window, and the account holds no positions,
//! it runs one screening cycle (rank → size → submit) and then waits for
//! the close before watching for the next session.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::executor::{ExecutionReport, OrderExecutor};
use super::retry::{with_retry, RetryPolicy};
use crate::broker::{MarketData, TradingApi};
use crate::config::{AgentConfig, AppConfig};
use crate::screener::{AllocationPlanner, CandidateRanker};
use crate::types::{AllocationPlan, RankedTable};

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// Where the loop is within a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the buy window.
    Watching,
    /// Bought this session; idle until the market closes.
    AwaitingClose,
}

/// What a single tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    MarketClosed { next_open: DateTime<Utc> },
    /// Open, but the close is further away than the buy window.
    Waiting { seconds_to_close: i64 },
    /// In the buy window with positions already held.
    HoldingPositions { count: usize },
    Bought(CycleReport),
    AwaitingClose,
    /// The market closed after a buy; watching resumes next tick.
    SessionClosed,
}

/// Summary of one screening cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub universe_size: usize,
    pub table: RankedTable,
    pub plan: AllocationPlan,
    pub cash: Decimal,
    pub execution: ExecutionReport,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

pub struct TradingLoop {
    trading: Arc<dyn TradingApi>,
    market_data: Arc<dyn MarketData>,
    ranker: CandidateRanker,
    executor: OrderExecutor,
    retry: RetryPolicy,
    agent: AgentConfig,
    phase: Phase,
    tick_count: u64,
    cycle_count: u64,
}

impl TradingLoop {
    pub fn new(config: &AppConfig, trading: Arc<dyn TradingApi>, market_data: Arc<dyn MarketData>) -> Self {
        Self {
            trading,
            market_data,
            ranker: CandidateRanker::new(config.screener.clone()),
            executor: OrderExecutor::new(config.agent.dry_run),
            retry: RetryPolicy::from_config(&config.retry),
            agent: config.agent.clone(),
            phase: Phase::Watching,
            tick_count: 0,
            cycle_count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Poll until `shutdown` resolves. Failed ticks are logged and the loop
    /// carries on with the next one.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(Duration::from_secs(self.agent.poll_interval_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.agent.poll_interval_secs,
            buy_window_secs = self.agent.buy_window_secs,
            dry_run = self.executor.is_dry_run(),
            "Entering main loop. Press Ctrl+C to stop."
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(outcome) => debug!(?outcome, phase = ?self.phase, "Tick"),
                        Err(e) => error!(error = format!("{e:#}"), "Tick failed, continuing"),
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received.");
                    break;
                }
            }
        }

        Ok(())
    }

    /// One poll of the clock and whatever it triggers.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let tick = self.tick_count;
        self.tick_count += 1;

        let trading = self.trading.as_ref();
        let clock = with_retry(&self.retry, "clock", || trading.clock())
            .await
            .context("Failed to query market clock")?;

        if self.phase == Phase::AwaitingClose {
            if clock.is_open {
                debug!("Waiting for market to close ...");
                return Ok(TickOutcome::AwaitingClose);
            }
            info!(next_open = %clock.next_open, "Market closed, watching for next session");
            self.phase = Phase::Watching;
            return Ok(TickOutcome::SessionClosed);
        }

        if !clock.is_open {
            if tick % self.agent.closed_log_every_ticks.max(1) == 0 {
                info!(
                    now = %clock.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                    next_open = %clock.next_open,
                    "Waiting for market open ..."
                );
            }
            return Ok(TickOutcome::MarketClosed {
                next_open: clock.next_open,
            });
        }

        let seconds_to_close = clock.time_until_close().num_seconds();
        if seconds_to_close > self.agent.buy_window_secs {
            if tick % self.agent.waiting_log_every_ticks.max(1) == 0 {
                info!(seconds_to_close, "Waiting to buy ...");
            }
            return Ok(TickOutcome::Waiting { seconds_to_close });
        }

        let positions = with_retry(&self.retry, "positions", || trading.positions())
            .await
            .context("Failed to list positions")?;
        if !positions.is_empty() {
            if tick % self.agent.waiting_log_every_ticks.max(1) == 0 {
                info!(count = positions.len(), "Positions already held, not buying");
            }
            return Ok(TickOutcome::HoldingPositions {
                count: positions.len(),
            });
        }

        let report = self.run_cycle().await?;
        self.phase = Phase::AwaitingClose;
        Ok(TickOutcome::Bought(report))
    }

    /// Screen, size and submit once.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let cycle_number = self.cycle_count + 1;
        info!(cycle = cycle_number, "Buying positions ...");

        let trading = self.trading.as_ref();
        let account = with_retry(&self.retry, "account", || trading.account())
            .await
            .context("Failed to fetch account")?;
        let assets = with_retry(&self.retry, "assets", || trading.list_assets())
            .await
            .context("Failed to list assets")?;

        let table = self
            .ranker
            .rank(&assets, self.market_data.as_ref())
            .await
            .context("Screening failed")?;

        info!("Calculating shares to buy ...");
        let plan = AllocationPlanner::plan(&table, account.cash);
        AllocationPlanner::log_plan(&plan, account.cash);

        let execution = self.executor.execute(trading, &plan).await;
        self.cycle_count = cycle_number;

        info!(
            cycle = cycle_number,
            candidates = table.len(),
            orders = execution.submitted.len(),
            failed = execution.failed.len(),
            committed = format!("${:.2}", execution.total_committed),
            "Positions bought."
        );

        Ok(CycleReport {
            cycle_number,
            universe_size: assets.len(),
            table,
            plan,
            cash: account.cash,
            execution,
            timestamp: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
