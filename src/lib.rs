pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod signing;
pub mod strategy;

pub use config::AppConfig;
pub use coordination::{cancellation, CancelHandle, Scheduler, WaitOutcome};
pub use domain::{
    GridPlan, OcoPlan, OrderRequest, OrderResult, OrderSide, OrderStatus, OrderType,
    StrategyOutcome, SymbolFilters, TwapPlan,
};
pub use error::{BotError, ErrorKind, Result};
pub use exchange::{build_gateway, check_connectivity, ExchangeGateway, ExchangeKind};
pub use strategy::{Strategy, StrategyEngine};
