//! DIPPER: end-of-day MACD dip-buying agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects to the broker, and runs the poll → screen → buy loop with
//! graceful shutdown.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use dipper::broker::alpaca::AlpacaClient;
use dipper::broker::TradingApi;
use dipper::config;
use dipper::engine::TradingLoop;

const CONFIG_PATH: &str = "config.toml";

const BANNER: &str = r#"
 ____ ___ ____  ____  _____ ____
|  _ \_ _|  _ \|  _ \| ____|  _ \
| | | | || |_) | |_) |  _| | |_) |
| |_| | ||  __/|  __/| |___|  _ <
|____/___|_|   |_|   |_____|_| \_\

  MACD dip screener, buys into the close
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = if Path::new(CONFIG_PATH).exists() {
        config::AppConfig::load(CONFIG_PATH)?
    } else {
        config::AppConfig::default()
    };

    init_logging();

    if !Path::new(CONFIG_PATH).exists() {
        warn!(path = CONFIG_PATH, "No config file found, using defaults");
    }
    cfg.validate()?;

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        trading_url = %cfg.broker.trading_url,
        max_stock_price = cfg.screener.max_stock_price,
        time_window = cfg.screener.time_window,
        top_n = cfg.screener.top_n,
        ema_seed = ?cfg.screener.ema_seed,
        dry_run = cfg.agent.dry_run,
        "DIPPER starting up"
    );

    // -- Initialise components -------------------------------------------

    let client = Arc::new(AlpacaClient::from_config(&cfg.broker)?);

    match client.account().await {
        Ok(account) => info!(
            cash = format!("${:.2}", account.cash),
            buying_power = format!("${:.2}", account.buying_power),
            "Connected to broker"
        ),
        Err(e) => warn!(error = %e, "Account check failed at startup, continuing"),
    }

    let mut trading_loop = TradingLoop::new(&cfg, client.clone(), client);

    // -- Main loop -------------------------------------------------------

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    trading_loop.run(shutdown).await?;

    info!(cycles = trading_loop.cycle_count(), "DIPPER shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dipper=info"));

    let json_logging = std::env::var("DIPPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
