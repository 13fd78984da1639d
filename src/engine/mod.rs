//! Core engine: the poll → screen → size → buy loop.

pub mod executor;
pub mod retry;
pub mod trading_loop;

pub use trading_loop::{Phase, TickOutcome, TradingLoop};
