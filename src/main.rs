use clap::Parser;
use futures_bot::cli::{Cli, Commands};
use futures_bot::config::AppConfig;
use futures_bot::coordination::cancellation;
use futures_bot::exchange::{build_gateway, check_connectivity};
use futures_bot::strategy::StrategyEngine;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

/// Usage and configuration problems, matching clap's own exit status
const USAGE_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config, e);
            return ExitCode::from(USAGE_EXIT);
        }
    };
    if cli.dry_run {
        config.dry_run.enabled = true;
    }
    if let Err(problems) = config.validate() {
        for problem in problems {
            eprintln!("config: {problem}");
        }
        return ExitCode::from(USAGE_EXIT);
    }

    let strategy = match cli.command.to_strategy(&config) {
        Ok(strategy) => strategy,
        Err(e) => {
            eprintln!("Invalid request: {e}");
            return ExitCode::from(USAGE_EXIT);
        }
    };

    let _log_guard = match &strategy {
        Some(_) => init_logging(&config.logging),
        None => {
            init_logging_simple();
            None
        }
    };

    let gateway = match build_gateway(&config, config.dry_run.enabled) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Failed to set up exchange gateway: {}", e);
            eprintln!("Failed to set up exchange gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(strategy) = strategy else {
        let symbol = match &cli.command {
            Commands::Ping { symbol } => symbol.clone(),
            _ => None,
        };
        return match check_connectivity(gateway.as_ref(), symbol.as_deref()).await {
            Ok(report) => {
                println!("{} gateway reachable, credentials accepted", report.gateway);
                if let (Some(symbol), Some(price)) = (&report.symbol, report.price) {
                    println!("{symbol}: {price}");
                }
                if let Some(filters) = &report.filters {
                    println!(
                        "tick {} step {} min qty {} min notional {}",
                        filters.tick_size, filters.step_size, filters.min_qty, filters.min_notional
                    );
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Ping failed ({}): {}", e.kind(), e);
                ExitCode::FAILURE
            }
        };
    };

    let (cancel, scheduler) = cancellation();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping after the current step");
                cancel.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });

    info!(
        gateway = %gateway.kind(),
        rest_url = %config.exchange.rest_url,
        dry_run = config.dry_run.enabled,
        "futures-bot starting"
    );

    let engine = StrategyEngine::new(gateway, &config, scheduler);
    let outcome = engine.run(strategy).await;

    println!("{outcome}");
    match serde_json::to_string(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!("Could not serialize outcome: {}", e),
    }

    ExitCode::from(outcome.exit_code() as u8)
}
