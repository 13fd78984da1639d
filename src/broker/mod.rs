//! Broker integrations.
//!
//! Defines the two collaborator traits the agent is written against and
//! provides the Alpaca implementation:
//! - `MarketData`: batched daily bars
//! - `TradingApi`: clock, account, positions, asset list, order entry
//!
//! Both are injected into the screener and the trading loop, so tests can
//! substitute in-memory fakes.

pub mod alpaca;

use async_trait::async_trait;

use crate::types::{Account, Asset, BarsBySymbol, BrokerError, Clock, OrderReceipt, OrderRequest, Position};

/// Source of historical daily bars.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the most recent `window` daily bars for each symbol.
    ///
    /// Symbols with no data may be absent from the map, and series may be
    /// shorter than `window` for recently listed symbols.
    async fn fetch_recent_bars(
        &self,
        symbols: &[String],
        window: usize,
    ) -> Result<BarsBySymbol, BrokerError>;
}

/// Account, clock and order-entry operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Current market clock.
    async fn clock(&self) -> Result<Clock, BrokerError>;

    /// Open positions.
    async fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Account balances.
    async fn account(&self) -> Result<Account, BrokerError>;

    /// Active assets in the equity universe, tradable or not.
    async fn list_assets(&self) -> Result<Vec<Asset>, BrokerError>;

    /// Submit one order.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderReceipt, BrokerError>;
}
