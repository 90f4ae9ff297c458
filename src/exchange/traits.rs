use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderRequest, OrderResult, OrderStatus, SymbolFilters};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    Binance,
    Paper,
}

impl Default for ExchangeKind {
    fn default() -> Self {
        Self::Binance
    }
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Paper => "paper",
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order placement capability the strategies run against.
///
/// Every call is one atomic network operation with its own timeout. Failures
/// come back as `BotError` values that classify via `BotError::kind()`.
/// Implementations must be safe to share between concurrently running
/// strategies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    fn kind(&self) -> ExchangeKind;

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult>;

    async fn get_order_status(&self, symbol: &str, order_id: &str) -> Result<OrderStatus>;

    async fn get_price(&self, symbol: &str) -> Result<Decimal>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()>;

    /// Connectivity check
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Trading rules for a symbol. `None` when the gateway has no
    /// exchange metadata; an unknown symbol is `InvalidRequest`.
    async fn symbol_filters(&self, _symbol: &str) -> Result<Option<SymbolFilters>> {
        Ok(None)
    }

    /// One signed read so a revoked or mistyped key fails as `Fatal`
    async fn verify_credentials(&self) -> Result<()> {
        Ok(())
    }
}
