use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::config::AppConfig;
use crate::domain::{GridPlan, OcoPlan, OrderSide, TwapPlan};
use crate::error::Result;
use crate::strategy::Strategy;

#[derive(Debug, Parser)]
#[command(name = "futures-bot")]
#[command(version)]
#[command(about = "Strategy execution bot for Binance USD-M futures", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Simulate orders against a paper gateway instead of the exchange
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, global = true, default_value = "config")]
    pub config: String,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Place a market order
    #[command(alias = "MARKET")]
    Market {
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
    },
    /// Place a GTC limit order
    #[command(alias = "LIMIT")]
    Limit {
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    },
    /// Place a stop-triggered limit order
    #[command(visible_alias = "stop_limit", alias = "STOP_LIMIT")]
    StopLimit {
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    },
    /// Split a large order into equal market chunks over time
    #[command(alias = "TWAP")]
    Twap {
        symbol: String,
        side: OrderSide,
        total_quantity: Decimal,
        /// Number of chunks
        chunks: u32,
        /// Seconds between chunks
        interval_secs: u64,
    },
    /// Run a limit-order grid across a price range until stopped
    #[command(alias = "GRID")]
    Grid {
        symbol: String,
        lower_price: Decimal,
        upper_price: Decimal,
        levels: u32,
        quantity_per_level: Decimal,
        /// Seconds between price polls
        poll_secs: u64,
        /// Stop after this many cycles instead of running until Ctrl-C
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Bracket an open position with a take-profit and a stop
    #[command(alias = "OCO")]
    Oco {
        symbol: String,
        /// Closing side (SELL closes a long)
        side: OrderSide,
        quantity: Decimal,
        take_profit: Decimal,
        stop_price: Decimal,
    },
    /// Check exchange connectivity, optionally printing a symbol's price
    #[command(alias = "PING")]
    Ping { symbol: Option<String> },
}

impl Commands {
    /// Build the strategy request for this command. `ping` has none.
    pub fn to_strategy(&self, config: &AppConfig) -> Result<Option<Strategy>> {
        let strategy = match self {
            Commands::Market {
                symbol,
                side,
                quantity,
            } => Strategy::Market {
                symbol: symbol.to_uppercase(),
                side: *side,
                quantity: *quantity,
            },
            Commands::Limit {
                symbol,
                side,
                quantity,
                price,
            } => Strategy::Limit {
                symbol: symbol.to_uppercase(),
                side: *side,
                quantity: *quantity,
                price: *price,
            },
            Commands::StopLimit {
                symbol,
                side,
                quantity,
                stop_price,
                limit_price,
            } => Strategy::StopLimit {
                symbol: symbol.to_uppercase(),
                side: *side,
                quantity: *quantity,
                stop_price: *stop_price,
                limit_price: *limit_price,
            },
            Commands::Twap {
                symbol,
                side,
                total_quantity,
                chunks,
                interval_secs,
            } => Strategy::Twap(TwapPlan::with_quantity_step(
                &symbol.to_uppercase(),
                *side,
                *total_quantity,
                *chunks,
                *interval_secs,
                config.twap.quantity_step,
            )?),
            Commands::Grid {
                symbol,
                lower_price,
                upper_price,
                levels,
                quantity_per_level,
                poll_secs,
                cycles,
            } => Strategy::Grid(
                GridPlan::new(
                    &symbol.to_uppercase(),
                    *lower_price,
                    *upper_price,
                    *levels,
                    *quantity_per_level,
                    *poll_secs,
                )?
                .with_price_scale(config.grid.price_scale)
                .with_max_cycles(*cycles),
            ),
            Commands::Oco {
                symbol,
                side,
                quantity,
                take_profit,
                stop_price,
            } => Strategy::Oco(OcoPlan::new(
                &symbol.to_uppercase(),
                *side,
                *quantity,
                *take_profit,
                *stop_price,
                config.oco.poll_interval_secs,
            )?),
            Commands::Ping { .. } => return Ok(None),
        };
        Ok(Some(strategy))
    }
}
