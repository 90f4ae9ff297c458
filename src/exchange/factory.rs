use std::sync::Arc;

use tracing::info;

use crate::adapters::{BinanceFuturesClient, PaperGateway};
use crate::config::AppConfig;
use crate::error::Result;
use crate::signing::ApiCredentials;

use super::ExchangeGateway;

/// Create the runtime gateway from `AppConfig`.
///
/// Dry runs get a paper gateway priced from the configured fixed price or,
/// failing that, the public ticker; credentials are only required live.
pub fn build_gateway(app_config: &AppConfig, dry_run: bool) -> Result<Arc<dyn ExchangeGateway>> {
    let exchange = &app_config.exchange;

    if dry_run {
        let paper = match app_config.dry_run.paper_price {
            Some(price) => {
                info!(%price, "dry run against fixed mark price");
                PaperGateway::with_fixed_price(price)
            }
            None => {
                let public = BinanceFuturesClient::new(
                    &exchange.rest_url,
                    None,
                    exchange.recv_window_ms,
                    exchange.request_timeout_ms,
                )?;
                info!(url = %exchange.rest_url, "dry run against live ticker prices");
                PaperGateway::with_live_prices(Arc::new(public))
            }
        };
        return Ok(Arc::new(paper));
    }

    let credentials = ApiCredentials::from_env()?;
    let client = BinanceFuturesClient::new(
        &exchange.rest_url,
        Some(credentials),
        exchange.recv_window_ms,
        exchange.request_timeout_ms,
    )?;
    info!(url = %client.base_url(), "live gateway ready");
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeKind;
    use rust_decimal_macros::dec;

    #[test]
    fn dry_run_builds_paper_gateway() {
        let mut config = AppConfig::default_config(true);
        config.dry_run.paper_price = Some(dec!(50000));

        let gateway = build_gateway(&config, true).expect("paper gateway");
        assert_eq!(gateway.kind(), ExchangeKind::Paper);
    }

    #[test]
    fn dry_run_without_fixed_price_needs_no_credentials() {
        let config = AppConfig::default_config(true);
        let gateway = build_gateway(&config, true).expect("paper gateway");
        assert_eq!(gateway.kind(), ExchangeKind::Paper);
    }
}
