//! CONFLUENCE: multi-timeframe crypto signal scanner.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod indicators;
pub mod detection;
pub mod engine;
pub mod market;
pub mod notify;
pub mod health;
