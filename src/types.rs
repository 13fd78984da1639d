//! Shared types for the DIPPER agent.
//!
//! These types form the data model used across all modules: broker
//! payloads (bars, assets, clock, account, orders), the screening
//! pipeline's candidates and ranked table, and the allocation plan.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// One daily OHLCV bar as returned by the market-data API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v", default)]
    pub volume: f64,
}

/// Ordered bars for one symbol, oldest first.
pub type BarSeries = Vec<Bar>;

/// Bars keyed by symbol, as returned by one batched fetch.
pub type BarsBySymbol = HashMap<String, BarSeries>;

/// A listed instrument. Only tradable assets enter screening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub tradable: bool,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, tradable: bool) -> Self {
        Self {
            symbol: symbol.into(),
            tradable,
        }
    }
}

// ---------------------------------------------------------------------------
// Screening output
// ---------------------------------------------------------------------------

/// A screened asset with a strictly positive rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub rating: f64,
    /// Latest close.
    pub price: Decimal,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rating {:.4} @ ${:.2})", self.symbol, self.rating, self.price)
    }
}

/// Candidates sorted by rating descending and truncated to the top N.
///
/// Construction goes through [`RankedTable::from_candidates`], so the
/// ordering and size invariants always hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedTable {
    candidates: Vec<Candidate>,
}

impl RankedTable {
    /// Sort by rating descending (stable, so ties keep fetch order) and
    /// keep the first `top_n`.
    pub fn from_candidates(mut candidates: Vec<Candidate>, top_n: usize) -> Self {
        candidates.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        candidates.truncate(top_n);
        Self { candidates }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Sum of included ratings.
    pub fn total_rating(&self) -> f64 {
        self.candidates.iter().map(|c| c.rating).sum()
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Whole-share quantity planned for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOrder {
    pub symbol: String,
    pub shares: u64,
    /// Price the quantity was sized against.
    pub price: Decimal,
}

impl PlannedOrder {
    /// Estimated cost at the sizing price.
    pub fn cost(&self) -> Decimal {
        self.price * Decimal::from(self.shares)
    }
}

/// Symbol → share count, in ranked order. Zero-share entries never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    orders: Vec<PlannedOrder>,
}

impl AllocationPlan {
    /// Append an order; zero quantities are dropped.
    pub fn push(&mut self, order: PlannedOrder) {
        if order.shares > 0 {
            self.orders.push(order);
        }
    }

    pub fn orders(&self) -> &[PlannedOrder] {
        &self.orders
    }

    pub fn shares_for(&self, symbol: &str) -> Option<u64> {
        self.orders
            .iter()
            .find(|o| o.symbol == symbol)
            .map(|o| o.shares)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Total estimated spend across all planned orders.
    pub fn total_cost(&self) -> Decimal {
        self.orders.iter().map(PlannedOrder::cost).sum()
    }
}

// ---------------------------------------------------------------------------
// Trading account
// ---------------------------------------------------------------------------

/// Market clock snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub timestamp: DateTime<Utc>,
    pub is_open: bool,
    pub next_open: DateTime<Utc>,
    pub next_close: DateTime<Utc>,
}

impl Clock {
    /// Time remaining until the next close, measured from the clock's own
    /// timestamp rather than the local wall clock.
    pub fn time_until_close(&self) -> chrono::Duration {
        self.next_close - self.timestamp
    }
}

/// An open position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: String,
    pub qty: Decimal,
}

/// Account balances relevant to sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub cash: Decimal,
    pub buying_power: Decimal,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
}

/// Order submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: u64,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub client_order_id: String,
}

impl OrderRequest {
    /// Market buy valid for the current session, with a fresh client id.
    pub fn market_buy_day(symbol: impl Into<String>, qty: u64) -> Self {
        Self {
            symbol: symbol.into(),
            qty,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Broker acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub qty: u64,
    pub status: String,
}

impl OrderReceipt {
    /// Synthetic receipt for an order that was only logged.
    pub fn dry_run(order: &OrderRequest) -> Self {
        Self {
            order_id: format!("dry-run-{}", order.client_order_id),
            client_order_id: order.client_order_id.clone(),
            symbol: order.symbol.clone(),
            qty: order.qty,
            status: "dry_run".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by broker collaborators, classified so callers can
/// decide what is worth retrying.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    #[error("Rate limited on {endpoint}")]
    RateLimited { endpoint: String },

    #[error("Network error on {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("Authentication rejected on {endpoint}: {message}")]
    Auth { endpoint: String, message: String },

    #[error("Broker API error {status} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },
}

impl BrokerError {
    /// Rate limits, transport failures and server-side errors are
    /// transient. Everything else is returned to the caller untouched.
    pub fn is_retryable(&self) -> bool {
        match self {
            BrokerError::RateLimited { .. } | BrokerError::Network { .. } => true,
            BrokerError::Api { status, .. } => *status >= 500,
            BrokerError::Auth { .. } | BrokerError::Decode { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
