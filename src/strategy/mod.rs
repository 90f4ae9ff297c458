//! Strategy module
//!
//! Turns a [`Strategy`] request into a sequence of exchange orders.
//!
//! ## Layers
//!
//! - `submitter` - validates one order and hands it to the gateway once
//! - `executor` - shared transient-retry policy around the submitter
//! - `single`, `twap`, `grid`, `oco` - one runner per strategy
//! - `engine` - dispatches a request to its runner and reports the outcome
//!
//! ## Usage
//!
//! ```bash
//! futures-bot twap BTCUSDT BUY 1 10 60
//! futures-bot --dry-run grid BTCUSDT 45000 55000 10 0.01 300 --cycles 3
//! ```

pub mod engine;
pub mod executor;
pub mod grid;
pub mod oco;
pub mod single;
pub mod submitter;
pub mod twap;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{Strategy, StrategyEngine};
pub use executor::{ExecutionError, ExecutionResult, OrderExecutor};
pub use grid::GridRunner;
pub use oco::OcoRunner;
pub use single::{check_stop_limit_prices, run_single};
pub use submitter::OrderSubmitter;
pub use twap::TwapRunner;
