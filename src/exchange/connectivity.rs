use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use super::{ExchangeGateway, ExchangeKind};
use crate::domain::SymbolFilters;
use crate::error::Result;

/// What `ping` learned about the gateway
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub gateway: ExchangeKind,
    pub symbol: Option<String>,
    pub filters: Option<SymbolFilters>,
    pub price: Option<Decimal>,
}

/// Reachability and server time, then a signed read, then (optionally) the
/// symbol's trading rules and price. Stops at the first failure.
pub async fn check_connectivity(
    gateway: &dyn ExchangeGateway,
    symbol: Option<&str>,
) -> Result<ConnectivityReport> {
    gateway.ping().await?;
    gateway.verify_credentials().await?;

    let mut report = ConnectivityReport {
        gateway: gateway.kind(),
        symbol: symbol.map(str::to_uppercase),
        filters: None,
        price: None,
    };

    if let Some(symbol) = report.symbol.clone() {
        report.filters = gateway.symbol_filters(&symbol).await?;
        report.price = Some(gateway.get_price(&symbol).await?);
    }

    info!(gateway = %report.gateway, symbol = ?report.symbol, "connectivity check passed");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BotError, ErrorKind};
    use crate::exchange::MockExchangeGateway;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn bad_credentials_fail_the_check() {
        let mut mock = MockExchangeGateway::new();
        mock.expect_ping().times(1).returning(|| Ok(()));
        mock.expect_verify_credentials()
            .times(1)
            .returning(|| Err(BotError::Auth("code -2015: Invalid API-key".to_string())));
        mock.expect_symbol_filters().times(0);
        mock.expect_get_price().times(0);

        let err = check_connectivity(&mock, Some("btcusdt")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[tokio::test]
    async fn reports_symbol_rules_and_price() {
        let mut mock = MockExchangeGateway::new();
        mock.expect_ping().returning(|| Ok(()));
        mock.expect_verify_credentials().returning(|| Ok(()));
        mock.expect_kind().return_const(ExchangeKind::Binance);
        mock.expect_symbol_filters().times(1).returning(|symbol| {
            Ok(Some(SymbolFilters {
                symbol: symbol.to_string(),
                tick_size: dec!(0.1),
                min_price: dec!(556.8),
                max_price: dec!(4529764),
                step_size: dec!(0.001),
                min_qty: dec!(0.001),
                max_qty: dec!(1000),
                min_notional: dec!(100),
            }))
        });
        mock.expect_get_price().returning(|_| Ok(dec!(64000)));

        let report = check_connectivity(&mock, Some("btcusdt")).await.unwrap();
        assert_eq!(report.symbol.as_deref(), Some("BTCUSDT"));
        assert_eq!(report.price, Some(dec!(64000)));
        let filters = report.filters.expect("rules reported");
        assert_eq!(filters.symbol, "BTCUSDT");
        assert_eq!(filters.tick_size, dec!(0.1));
    }

    #[tokio::test]
    async fn unknown_symbol_fails_the_check() {
        let mut mock = MockExchangeGateway::new();
        mock.expect_ping().returning(|| Ok(()));
        mock.expect_verify_credentials().returning(|| Ok(()));
        mock.expect_kind().return_const(ExchangeKind::Binance);
        mock.expect_symbol_filters()
            .returning(|s| Err(BotError::InvalidRequest(format!("unknown symbol {s}"))));

        let err = check_connectivity(&mock, Some("NOPEUSDT")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
