//! Integration tests: full scan cycles against an in-memory market.

mod mock_market;
mod scan_cycle;
