//! Mock broker for integration testing.
//!
//! Provides a deterministic implementation of both broker traits that
//! serves scripted clocks and known bar histories, accepts orders, and
//! tracks positions, all in-memory with no external dependencies.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use dipper::broker::{MarketData, TradingApi};
use dipper::types::*;

/// A mock broker for deterministic testing.
///
/// Clocks are served in order; the last one repeats once the script is
/// exhausted. All other state is fully controllable from test code.
pub struct MockBroker {
    clocks: Mutex<VecDeque<Clock>>,
    assets: Vec<Asset>,
    bars: BarsBySymbol,
    cash: Arc<Mutex<Decimal>>,
    positions: Arc<Mutex<Vec<Position>>>,
    orders: Arc<Mutex<Vec<OrderRequest>>>,
    bar_requests: Arc<Mutex<Vec<Vec<String>>>>,
    rejected_symbols: Vec<String>,
    /// If set, every call returns this error.
    force_error: Arc<Mutex<Option<BrokerError>>>,
}

impl MockBroker {
    pub fn new(cash: Decimal) -> Self {
        Self {
            clocks: Mutex::new(VecDeque::new()),
            assets: Vec::new(),
            bars: HashMap::new(),
            cash: Arc::new(Mutex::new(cash)),
            positions: Arc::new(Mutex::new(Vec::new())),
            orders: Arc::new(Mutex::new(Vec::new())),
            bar_requests: Arc::new(Mutex::new(Vec::new())),
            rejected_symbols: Vec::new(),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Add a tradable asset with its bar history.
    pub fn with_symbol(mut self, symbol: &str, closes: &[f64]) -> Self {
        self.assets.push(Asset::new(symbol, true));
        self.bars.insert(symbol.to_string(), bars_from_closes(closes));
        self
    }

    /// Add a listed but untradable asset.
    pub fn with_untradable(mut self, symbol: &str, closes: &[f64]) -> Self {
        self.assets.push(Asset::new(symbol, false));
        self.bars.insert(symbol.to_string(), bars_from_closes(closes));
        self
    }

    /// Orders for `symbol` are rejected with a 403.
    pub fn rejecting(mut self, symbol: &str) -> Self {
        self.rejected_symbols.push(symbol.to_string());
        self
    }

    pub fn with_position(self, symbol: &str, qty: i64) -> Self {
        self.positions.lock().unwrap().push(Position {
            symbol: symbol.to_string(),
            qty: Decimal::from(qty),
        });
        self
    }

    /// Script the clock responses.
    pub fn with_clocks(self, clocks: Vec<Clock>) -> Self {
        *self.clocks.lock().unwrap() = clocks.into();
        self
    }

    pub fn set_error(&self, error: BrokerError) {
        *self.force_error.lock().unwrap() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn bar_requests(&self) -> Vec<Vec<String>> {
        self.bar_requests.lock().unwrap().clone()
    }

    pub fn cash(&self) -> Decimal {
        *self.cash.lock().unwrap()
    }

    fn check_error(&self) -> Result<(), BrokerError> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn last_close(&self, symbol: &str) -> Option<Decimal> {
        self.bars
            .get(symbol)
            .and_then(|b| b.last())
            .and_then(|b| Decimal::from_f64(b.close))
    }
}

#[async_trait]
impl MarketData for MockBroker {
    async fn fetch_recent_bars(
        &self,
        symbols: &[String],
        window: usize,
    ) -> Result<BarsBySymbol, BrokerError> {
        self.check_error()?;
        self.bar_requests.lock().unwrap().push(symbols.to_vec());
        Ok(symbols
            .iter()
            .filter_map(|s| {
                self.bars.get(s).map(|series| {
                    let skip = series.len().saturating_sub(window);
                    (s.clone(), series[skip..].to_vec())
                })
            })
            .collect())
    }
}

#[async_trait]
impl TradingApi for MockBroker {
    async fn clock(&self) -> Result<Clock, BrokerError> {
        self.check_error()?;
        let mut clocks = self.clocks.lock().unwrap();
        let clock = if clocks.len() > 1 {
            clocks.pop_front()
        } else {
            clocks.front().cloned()
        };
        clock.ok_or_else(|| BrokerError::Api {
            endpoint: "clock".into(),
            status: 500,
            message: "no clock scripted".into(),
        })
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.check_error()?;
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn account(&self) -> Result<Account, BrokerError> {
        self.check_error()?;
        let cash = *self.cash.lock().unwrap();
        Ok(Account {
            cash,
            buying_power: cash,
        })
    }

    async fn list_assets(&self) -> Result<Vec<Asset>, BrokerError> {
        self.check_error()?;
        Ok(self.assets.clone())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderReceipt, BrokerError> {
        self.check_error()?;

        if self.rejected_symbols.contains(&order.symbol) {
            return Err(BrokerError::Api {
                endpoint: "orders".into(),
                status: 403,
                message: format!("asset {} is not fillable", order.symbol),
            });
        }

        let price = self.last_close(&order.symbol).ok_or_else(|| BrokerError::Api {
            endpoint: "orders".into(),
            status: 422,
            message: format!("unknown symbol {}", order.symbol),
        })?;
        let cost = price * Decimal::from(order.qty);

        let mut cash = self.cash.lock().unwrap();
        if *cash < cost {
            return Err(BrokerError::Api {
                endpoint: "orders".into(),
                status: 403,
                message: "insufficient buying power".into(),
            });
        }
        *cash -= cost;

        self.positions.lock().unwrap().push(Position {
            symbol: order.symbol.clone(),
            qty: Decimal::from(order.qty),
        });
        self.orders.lock().unwrap().push(order.clone());

        Ok(OrderReceipt {
            order_id: format!("MOCK-{}", Uuid::new_v4()),
            client_order_id: order.client_order_id.clone(),
            symbol: order.symbol.clone(),
            qty: order.qty,
            status: "accepted".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Daily bars, one per calendar day, all OHLC at the close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2026, 1, 2, 5, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar {
            timestamp: start + Duration::days(i as i64),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 50_000.0,
        })
        .collect()
}

/// `flat` bars at `base`, compounding `growth` up to bar 29, then a 3%
/// drop on the last bar.
pub fn dip_closes(flat: usize, base: f64, growth: f64) -> Vec<f64> {
    let mut closes = vec![base; flat];
    while closes.len() < 29 {
        let last = *closes.last().unwrap();
        closes.push(last * growth);
    }
    let last = *closes.last().unwrap();
    closes.push(last * 0.97);
    closes
}

fn session_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap()
}

pub fn open_clock(seconds_to_close: i64) -> Clock {
    let now = session_now();
    Clock {
        timestamp: now,
        is_open: true,
        next_open: now + Duration::hours(18),
        next_close: now + Duration::seconds(seconds_to_close),
    }
}

pub fn closed_clock() -> Clock {
    let now = session_now() + Duration::hours(2);
    Clock {
        timestamp: now,
        is_open: false,
        next_open: now + Duration::hours(16),
        next_close: now + Duration::hours(23),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_clock_script_repeats_last() {
        let broker = MockBroker::new(dec!(100)).with_clocks(vec![open_clock(300), closed_clock()]);
        assert!(broker.clock().await.unwrap().is_open);
        assert!(!broker.clock().await.unwrap().is_open);
        assert!(!broker.clock().await.unwrap().is_open);
    }

    #[tokio::test]
    async fn test_mock_fetch_trims_to_window() {
        let broker = MockBroker::new(dec!(100)).with_symbol("AAA", &dip_closes(25, 2.0, 1.06));
        let bars = broker
            .fetch_recent_bars(&["AAA".to_string(), "ZZZ".to_string()], 10)
            .await
            .unwrap();
        assert_eq!(bars["AAA"].len(), 10);
        assert!(!bars.contains_key("ZZZ"));
    }

    #[tokio::test]
    async fn test_mock_order_debits_cash_and_opens_position() {
        let broker = MockBroker::new(dec!(100)).with_symbol("AAA", &[2.0; 30]);
        let receipt = broker
            .submit_order(&OrderRequest::market_buy_day("AAA", 10))
            .await
            .unwrap();
        assert_eq!(receipt.qty, 10);
        assert_eq!(broker.cash(), dec!(80));
        assert_eq!(broker.positions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_insufficient_cash() {
        let broker = MockBroker::new(dec!(5)).with_symbol("AAA", &[2.0; 30]);
        let err = broker
            .submit_order(&OrderRequest::market_buy_day("AAA", 10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("insufficient buying power"));
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let broker = MockBroker::new(dec!(100)).with_clocks(vec![closed_clock()]);
        broker.set_error(BrokerError::RateLimited { endpoint: "clock".into() });
        assert!(broker.clock().await.is_err());
        assert!(broker.account().await.is_err());
        broker.clear_error();
        assert!(broker.clock().await.is_ok());
    }
}
