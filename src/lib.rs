//! DIPPER: end-of-day MACD dip-buying agent
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod indicators;
pub mod screener;
pub mod broker;
pub mod engine;
