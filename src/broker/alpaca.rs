//! Alpaca brokerage integration.
//!
//! Trading API (clock, account, positions, assets, orders) and the
//! market-data v2 bars endpoint.
//!
//! API docs: https://docs.alpaca.markets/reference
//! Trading base URL: https://paper-api.alpaca.markets (paper) or
//! https://api.alpaca.markets (live)
//! Data base URL: https://data.alpaca.markets
//! Auth: `APCA-API-KEY-ID` / `APCA-API-SECRET-KEY` headers on every call.
//! Rate limit: 200 requests/minute per account (HTTP 429 when exceeded).

use anyhow::Context;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use super::{MarketData, TradingApi};
use crate::config::{AppConfig, BrokerConfig};
use crate::types::{
    Account, Asset, Bar, BarsBySymbol, BrokerError, Clock, OrderReceipt, OrderRequest, Position,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Maximum bars per page on `/v2/stocks/bars` (API max is 10000).
const BARS_PAGE_LIMIT: u32 = 10_000;

/// Calendar days requested per daily bar needed (weekends, holidays).
const CALENDAR_DAYS_PER_BAR: i64 = 2;

/// Extra calendar days on top of the lookback for long market closures.
const LOOKBACK_PADDING_DAYS: i64 = 10;

// ---------------------------------------------------------------------------
// API response types (Alpaca JSON → Rust)
// ---------------------------------------------------------------------------

/// One page of `/v2/stocks/bars`. `bars` is `null` when nothing matched.
#[derive(Debug, Deserialize)]
struct BarsPage {
    #[serde(default)]
    bars: Option<HashMap<String, Vec<Bar>>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// `/v2/account`. Monetary fields are decimal strings.
#[derive(Debug, Deserialize)]
struct AlpacaAccount {
    cash: String,
    #[serde(default)]
    buying_power: Option<String>,
}

/// `/v2/positions` entry.
#[derive(Debug, Deserialize)]
struct AlpacaPosition {
    symbol: String,
    qty: String,
}

/// `/v2/orders` POST response.
#[derive(Debug, Deserialize)]
struct AlpacaOrder {
    id: String,
    #[serde(default)]
    client_order_id: String,
    symbol: String,
    #[serde(default)]
    qty: Option<String>,
    status: String,
}

/// Error body: `{"code": 40310000, "message": "insufficient buying power"}`.
#[derive(Debug, Deserialize)]
struct AlpacaErrorBody {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Alpaca REST client implementing both broker traits.
pub struct AlpacaClient {
    http: Client,
    trading_url: String,
    data_url: String,
    data_feed: String,
    key_id: String,
    secret_key: SecretString,
}

impl AlpacaClient {
    pub fn new(config: &BrokerConfig, key_id: String, secret_key: SecretString) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent("DIPPER/0.1.0 (dip-buying-agent)")
            .build()
            .context("Failed to build HTTP client for Alpaca")?;

        Ok(Self {
            http,
            trading_url: config.trading_url.trim_end_matches('/').to_string(),
            data_url: config.data_url.trim_end_matches('/').to_string(),
            data_feed: config.data_feed.clone(),
            key_id,
            secret_key,
        })
    }

    /// Build a client with keys resolved from the env vars named in config.
    pub fn from_config(config: &BrokerConfig) -> anyhow::Result<Self> {
        let key_id = AppConfig::resolve_env(&config.key_id_env)?;
        let secret_key = SecretString::new(AppConfig::resolve_env(&config.secret_key_env)?);
        Self::new(config, key_id, secret_key)
    }

    // -- Internal helpers ------------------------------------------------

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", self.key_id.as_str())
            .header("APCA-API-SECRET-KEY", self.secret_key.expose_secret().as_str())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, endpoint: &str) -> Result<T, BrokerError> {
        debug!(url = %url, "Alpaca GET");
        let resp = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    fn bars_url(&self, symbols: &[String], start: &str, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/v2/stocks/bars?symbols={}&timeframe=1Day&start={}&limit={}&adjustment=raw&feed={}",
            self.data_url,
            urlencoding::encode(&symbols.join(",")),
            urlencoding::encode(start),
            BARS_PAGE_LIMIT,
            self.data_feed,
        );
        if let Some(token) = page_token {
            url.push_str("&page_token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }
}

#[async_trait]
impl MarketData for AlpacaClient {
    async fn fetch_recent_bars(
        &self,
        symbols: &[String],
        window: usize,
    ) -> Result<BarsBySymbol, BrokerError> {
        let mut out: BarsBySymbol = HashMap::with_capacity(symbols.len());
        if symbols.is_empty() || window == 0 {
            return Ok(out);
        }

        let lookback_days = window as i64 * CALENDAR_DAYS_PER_BAR + LOOKBACK_PADDING_DAYS;
        let start = (Utc::now() - chrono::Duration::days(lookback_days))
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut page_token: Option<String> = None;
        let mut pages = 0u32;
        loop {
            let url = self.bars_url(symbols, &start, page_token.as_deref());
            let page: BarsPage = self.get_json(&url, "bars").await?;
            pages += 1;

            for (symbol, bars) in page.bars.unwrap_or_default() {
                out.entry(symbol).or_default().extend(bars);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        for series in out.values_mut() {
            keep_most_recent(series, window);
        }

        debug!(
            requested = symbols.len(),
            returned = out.len(),
            pages,
            "Fetched daily bars"
        );

        Ok(out)
    }
}

#[async_trait]
impl TradingApi for AlpacaClient {
    async fn clock(&self) -> Result<Clock, BrokerError> {
        let url = format!("{}/v2/clock", self.trading_url);
        self.get_json(&url, "clock").await
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let url = format!("{}/v2/positions", self.trading_url);
        let raw: Vec<AlpacaPosition> = self.get_json(&url, "positions").await?;
        raw.into_iter()
            .map(|p| -> Result<Position, BrokerError> {
                Ok(Position {
                    qty: parse_decimal("positions", "qty", &p.qty)?,
                    symbol: p.symbol,
                })
            })
            .collect()
    }

    async fn account(&self) -> Result<Account, BrokerError> {
        let url = format!("{}/v2/account", self.trading_url);
        let raw: AlpacaAccount = self.get_json(&url, "account").await?;
        let cash = parse_decimal("account", "cash", &raw.cash)?;
        let buying_power = match raw.buying_power.as_deref() {
            Some(bp) => parse_decimal("account", "buying_power", bp)?,
            None => cash,
        };
        Ok(Account { cash, buying_power })
    }

    async fn list_assets(&self) -> Result<Vec<Asset>, BrokerError> {
        let url = format!("{}/v2/assets?status=active&asset_class=us_equity", self.trading_url);
        self.get_json(&url, "assets").await
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderReceipt, BrokerError> {
        let url = format!("{}/v2/orders", self.trading_url);
        debug!(symbol = %order.symbol, qty = order.qty, side = ?order.side, "Submitting Alpaca order");

        let resp = self
            .authed(self.http.post(&url))
            .json(order)
            .send()
            .await
            .map_err(|e| transport_error("orders", e))?;
        let raw: AlpacaOrder = read_json("orders", resp).await?;

        let qty = raw
            .qty
            .as_deref()
            .and_then(|q| q.parse::<u64>().ok())
            .unwrap_or(order.qty);

        Ok(OrderReceipt {
            order_id: raw.id,
            client_order_id: if raw.client_order_id.is_empty() {
                order.client_order_id.clone()
            } else {
                raw.client_order_id
            },
            symbol: raw.symbol,
            qty,
            status: raw.status,
        })
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

async fn read_json<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, BrokerError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| transport_error(endpoint, e))?;

    if !status.is_success() {
        return Err(status_error(endpoint, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| BrokerError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> BrokerError {
    BrokerError::Network {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}

/// Map a non-success HTTP status to a classified error.
fn status_error(endpoint: &str, status: StatusCode, body: &str) -> BrokerError {
    let message = serde_json::from_str::<AlpacaErrorBody>(body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited {
            endpoint: endpoint.to_string(),
        },
        StatusCode::UNAUTHORIZED => BrokerError::Auth {
            endpoint: endpoint.to_string(),
            message,
        },
        _ => BrokerError::Api {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        },
    }
}

fn parse_decimal(endpoint: &str, field: &str, value: &str) -> Result<Decimal, BrokerError> {
    Decimal::from_str(value).map_err(|e| BrokerError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("{field} = {value:?}: {e}"),
    })
}

/// Order by timestamp and drop everything but the last `window` bars.
fn keep_most_recent(series: &mut Vec<Bar>, window: usize) {
    series.sort_by_key(|b| b.timestamp);
    if series.len() > window {
        series.drain(..series.len() - window);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
